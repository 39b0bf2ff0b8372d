use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single article record as stored in the document and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String, // UUID
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Public reference to the companion image, e.g. `/uploads/1714557600000-cat.png`.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(with = "crate::model::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::model::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// The whole persisted document: `{ "articles": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDocument {
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl ArticleDocument {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.articles.iter().position(|a| a.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORED: &str = r#"{
  "articles": [
    {
      "id": "test-id",
      "title": "Test Article",
      "content": "Test Content",
      "image": null,
      "created_at": "2024-05-01T10:00:00.000Z",
      "updated_at": "2024-05-01T10:00:00.000Z"
    }
  ]
}"#;

    #[test]
    fn test_reads_document_written_by_previous_server() {
        let doc: ArticleDocument = serde_json::from_str(STORED).unwrap();
        assert_eq!(doc.articles.len(), 1);
        assert_eq!(doc.articles[0].title, "Test Article");
        assert!(doc.articles[0].image.is_none());
        assert_eq!(doc.position("test-id"), Some(0));
        assert!(doc.find("missing").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let doc: ArticleDocument = serde_json::from_str(STORED).unwrap();
        let value = serde_json::to_value(&doc.articles[0]).unwrap();
        assert_eq!(value["image"], serde_json::Value::Null);
        assert_eq!(value["created_at"], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["id"], "test-id");
    }

    #[test]
    fn test_missing_articles_key_is_empty_document() {
        let doc: ArticleDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.articles.is_empty());
    }
}
