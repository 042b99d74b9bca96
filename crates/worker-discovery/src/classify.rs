//! Classification and adapter/data-client linking.

use std::collections::HashMap;

use crate::types::{Category, ClassRecord};

/// Classify every discovered class as an adapter or a data-client, without
/// linking. Callers that need the raw data-client records (e.g. the
/// executor's real-fetch path) use this instead of [`categorize_and_link`],
/// which discards data-clients after linking.
pub fn partition(all_classes: Vec<ClassRecord>) -> (Vec<ClassRecord>, Vec<ClassRecord>) {
    let mut adapters = Vec::new();
    let mut data_clients = Vec::new();
    for mut record in all_classes {
        record.category = classify(&record.base_classes);
        match record.category {
            Category::Adapter => adapters.push(record),
            Category::DataClient => data_clients.push(record),
        }
    }
    (adapters, data_clients)
}

/// Classify every discovered class as an adapter or a data-client, then
/// link each adapter to the data-client(s) whose class declares the
/// adapter's `source_type` as its own generic type argument, and return
/// only the adapters (§4.2: data-clients are not surfaced on their own).
pub fn categorize_and_link(all_classes: Vec<ClassRecord>) -> Vec<ClassRecord> {
    let mut classified: Vec<ClassRecord> = all_classes
        .into_iter()
        .map(|mut record| {
            record.category = classify(&record.base_classes);
            record
        })
        .collect();

    // A data-client's own `source_type` is the type it produces, so it is
    // matched against an adapter's `source_type` by name.
    let mut clients_by_source_type: HashMap<String, Vec<String>> = HashMap::new();
    for record in &classified {
        if record.category == Category::DataClient {
            if let Some(source_type) = &record.source_type {
                clients_by_source_type
                    .entry(source_type.clone())
                    .or_default()
                    .push(record.class_name.clone());
            }
        }
    }

    for record in &mut classified {
        if record.category != Category::Adapter {
            continue;
        }
        if let Some(source_type) = &record.source_type {
            if let Some(clients) = clients_by_source_type.get(source_type) {
                record.data_clients = clients.clone();
            }
        }
    }

    classified
        .into_iter()
        .filter(|r| r.category == Category::Adapter)
        .collect()
}

/// DataClient beats Connector/DataSource beats the adapter default, per
/// declared base class names.
fn classify(base_classes: &[String]) -> Category {
    if base_classes.iter().any(|b| b.contains("DataClient")) {
        return Category::DataClient;
    }
    if base_classes
        .iter()
        .any(|b| b.contains("Connector") || b.contains("DataSource"))
    {
        return Category::Adapter;
    }
    Category::Adapter
}
