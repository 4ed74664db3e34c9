//! Turning an item detail document into a [`MetadataRow`].

use crate::models::{ItemDetail, MetadataRow};

use super::FailureReason;

/// Append `fo=json` to an item URL unless it is already there
pub fn ensure_json_format(url: &str) -> String {
    if url.contains("fo=json") {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&fo=json", url)
    } else {
        format!("{}?fo=json", url)
    }
}

/// First non-empty PDF link, looking at `resource` before `resources`
pub fn first_pdf_link(detail: &ItemDetail) -> Option<&str> {
    detail
        .resource
        .iter()
        .chain(detail.resources.iter())
        .map(|link| link.pdf.trim())
        .find(|pdf| !pdf.is_empty())
}

/// Extract the exported fields; missing values become empty strings.
///
/// Fails when the document has no `item` section, or, with `strict_city`,
/// when the city is empty.
pub fn extract_row(detail: &ItemDetail, strict_city: bool) -> Result<MetadataRow, FailureReason> {
    let item = detail.item.as_ref().ok_or(FailureReason::MissingItem)?;

    if strict_city && item.location_city.trim().is_empty() {
        return Err(FailureReason::MissingCity);
    }

    Ok(MetadataRow {
        newspaper_title: item.newspaper_title.clone(),
        issue_date: item.date.clone(),
        page_number: detail
            .pagination
            .as_ref()
            .map(|p| p.current.clone())
            .unwrap_or_default(),
        lccn: item.number_lccn.clone(),
        city: item.location_city.clone(),
        state: item.location_state.clone(),
        contributor: item.contributor_names.clone(),
        batch: item.batch.clone(),
        pdf_link: first_pdf_link(detail).unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::item_detail;
    use serde_json::json;

    fn detail(value: serde_json::Value) -> ItemDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ensure_json_format() {
        assert_eq!(
            ensure_json_format("http://www.loc.gov/item/sn1/"),
            "http://www.loc.gov/item/sn1/?fo=json"
        );
        assert_eq!(
            ensure_json_format("http://www.loc.gov/resource/sn1/?sp=2"),
            "http://www.loc.gov/resource/sn1/?sp=2&fo=json"
        );
        assert_eq!(
            ensure_json_format("http://www.loc.gov/item/sn1/?fo=json"),
            "http://www.loc.gov/item/sn1/?fo=json"
        );
    }

    #[test]
    fn test_extract_typical_item() {
        let row = extract_row(&detail(item_detail("The Wheeling Daily", "1872-01-04", "wheeling")), false)
            .unwrap();

        assert_eq!(row.newspaper_title, "The Wheeling Daily");
        assert_eq!(row.issue_date, "1872-01-04");
        assert_eq!(row.page_number, "2");
        assert_eq!(row.city, "wheeling");
        assert_eq!(row.state, "west virginia");
        assert_eq!(row.lccn, "sn84026844");
        assert_eq!(row.contributor, "West Virginia University; Library of Congress");
        assert_eq!(row.batch, "wv_elk_ver01");
        assert_eq!(row.pdf_link, "https://tile.loc.gov/storage-services/page.pdf");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let row = extract_row(&detail(json!({"item": {}})), false).unwrap();
        assert_eq!(row, MetadataRow::default());
    }

    #[test]
    fn test_missing_item_section() {
        assert_eq!(
            extract_row(&detail(json!({"resources": []})), false),
            Err(FailureReason::MissingItem)
        );
    }

    #[test]
    fn test_strict_city() {
        let doc = detail(json!({"item": {"newspaper_title": "X", "location_city": []}}));
        assert!(extract_row(&doc, false).is_ok());
        assert_eq!(extract_row(&doc, true), Err(FailureReason::MissingCity));
    }

    #[test]
    fn test_pdf_prefers_resource_then_resources() {
        let doc = detail(json!({
            "item": {},
            "resource": {"pdf": "https://tile.loc.gov/a.pdf"},
            "resources": [{"pdf": "https://tile.loc.gov/b.pdf"}]
        }));
        assert_eq!(first_pdf_link(&doc), Some("https://tile.loc.gov/a.pdf"));

        let doc = detail(json!({
            "item": {},
            "resource": {"pdf": ""},
            "resources": [{"pdf": null}, {"pdf": "https://tile.loc.gov/b.pdf"}]
        }));
        assert_eq!(first_pdf_link(&doc), Some("https://tile.loc.gov/b.pdf"));

        assert_eq!(first_pdf_link(&detail(json!({"item": {}}))), None);
    }
}
