//! Layer merging over raw TOML trees.

/// Recursively merge `overlay` into `base`.
///
/// Tables merge key by key; any other overlay value (scalar or array)
/// replaces the base value outright, so a `[[storage.backends]]` list in a
/// later layer replaces the earlier list rather than appending to it.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Set the value at a dotted `path`, creating intermediate tables.
///
/// Returns `false` if a non-table value sits on the path.
pub fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return true;
        }
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    false
}
