//! JSON and flattened CSV encodings of a count tree

use crate::tree::CountTree;
use shield_common::{Error, Result};
use std::fmt;

/// Artifact encodings; every artifact is published in both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Json, Format::Csv];

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }

    /// Encode a tree in this format
    pub fn render(&self, tree: &CountTree) -> Result<Vec<u8>> {
        match self {
            Format::Json => to_json(tree).map(String::into_bytes),
            Format::Csv => Ok(to_csv(tree).into_bytes()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Structural JSON encoding
pub fn to_json(tree: &CountTree) -> Result<String> {
    serde_json::to_string(tree).map_err(|e| Error::Internal(format!("JSON encoding failed: {}", e)))
}

/// One row per leaf: the key path followed by the count
pub fn flatten(tree: &CountTree) -> Vec<Vec<String>> {
    tree.leaves()
        .into_iter()
        .map(|(mut path, value)| {
            path.push(value.to_string());
            path
        })
        .collect()
}

/// Flattened rows with every field quoted, CRLF line endings
pub fn to_csv(tree: &CountTree) -> String {
    let mut out = String::new();
    for row in flatten(tree) {
        let fields: Vec<String> = row.iter().map(|f| quote(f)).collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_leaf() -> CountTree {
        let mut tree = CountTree::new();
        tree.set(&["20240101", "survey1", "engaged"], 7);
        tree
    }

    #[test]
    fn test_flatten_single_leaf() {
        assert_eq!(
            flatten(&single_leaf()),
            vec![vec!["20240101", "survey1", "engaged", "7"]]
        );
    }

    #[test]
    fn test_csv_quotes_every_field() {
        assert_eq!(
            to_csv(&single_leaf()),
            "\"20240101\",\"survey1\",\"engaged\",\"7\"\r\n"
        );
    }

    #[test]
    fn test_csv_escapes_embedded_quotes() {
        let mut tree = CountTree::new();
        tree.set(&["say \"hi\"", "closed"], 1);
        assert_eq!(to_csv(&tree), "\"say \"\"hi\"\"\",\"closed\",\"1\"\r\n");
    }

    #[test]
    fn test_column_count_follows_depth() {
        let mut tree = CountTree::new();
        tree.set(&["s1", "20240101", "offered"], 2);
        tree.set(&["s1", "20240102", "voted5"], 1);
        tree.set(&["s2", "20240101", "engaged"], 4);

        let rows = flatten(&tree);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == tree.depth() + 1));

        let per_date = tree.child_or_empty("s1");
        assert!(flatten(&per_date).iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_empty_tree_encodings() {
        let tree = CountTree::new();
        assert_eq!(to_json(&tree).unwrap(), "{}");
        assert_eq!(to_csv(&tree), "");
    }

    #[test]
    fn test_render_by_format() {
        let tree = single_leaf();
        assert_eq!(
            Format::Json.render(&tree).unwrap(),
            br#"{"20240101":{"survey1":{"engaged":7}}}"#.to_vec()
        );
        assert_eq!(Format::Csv.extension(), "csv");
        assert_eq!(Format::Json.to_string(), "json");
    }
}
