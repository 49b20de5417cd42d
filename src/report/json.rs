use serde_json::Value;

use super::Report;

/// Pretty JSON with screenshot payloads left out of each request.
pub fn render(report: &Report) -> anyhow::Result<String> {
    let mut doc = serde_json::to_value(report)?;
    if let Some(requests) = doc.get_mut("requests").and_then(Value::as_array_mut) {
        for request in requests {
            if let Some(metadata) = request.get_mut("metadata").and_then(Value::as_object_mut)
                && metadata.remove("screenshot").is_some()
            {
                metadata.insert("hasScreenshot".into(), Value::Bool(true));
            }
        }
    }
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewRequest, RequestMetadata};
    use crate::db::{Database, Repository};

    #[test]
    fn test_screenshots_are_left_out() {
        let db = Database::open_in_memory().unwrap();
        let mut new = NewRequest::pending("Spokeo", "a@gmail.com");
        new.metadata = RequestMetadata {
            screenshot: Some("data:image/png;base64,AAAA".into()),
            attempts: Some(1),
            ..Default::default()
        };
        db.create_request(new).unwrap();

        let rendered = render(&Report::build(&db).unwrap()).unwrap();
        assert!(!rendered.contains("base64"));
        let doc: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(doc["requests"][0]["metadata"]["hasScreenshot"], true);
        assert_eq!(doc["requests"][0]["metadata"]["attempts"], 1);
    }
}
