use crate::error::{CoreError, CoreResult};
use crate::storage::Storage;
use serde::Serialize;
use std::path::Path;

/// One row of the `export` tabular report (§6): a snippet/link pair.
#[derive(Debug, Serialize)]
struct ExportRow {
    doc_url: String,
    page_id: String,
    snippet: String,
    verbatim: String,
    spec_num: String,
    ezid: String,
    match_quality: String,
    department: String,
}

/// `export <path>`: walks every document's snippets and links, pairing
/// each link with the snippets its verbatim appears in, and writes one
/// CSV row per pair.
pub async fn export_links(storage: &dyn Storage, path: impl AsRef<Path>) -> CoreResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .map_err(|e| CoreError::ExternalIo(format!("cannot open export file: {e}")))?;

    for doc in storage.all_documents().await? {
        let snippets = storage.snippets_for_document(&doc.url).await?;
        let links = storage.links_for_document(&doc.url).await?;
        for link in &links {
            let matching_snippets: Vec<_> = snippets.iter().filter(|s| s.snippet.contains(&link.verbatim)).collect();
            if matching_snippets.is_empty() {
                write_row(&mut writer, &doc.url, None, "", link)?;
                continue;
            }
            for snippet in matching_snippets {
                write_row(&mut writer, &doc.url, snippet.page_id.as_deref(), &snippet.snippet, link)?;
            }
        }
    }
    writer.flush().map_err(|e| CoreError::ExternalIo(format!("cannot flush export file: {e}")))?;
    Ok(())
}

fn write_row(
    writer: &mut csv::Writer<std::fs::File>,
    doc_url: &str,
    page_id: Option<&str>,
    snippet: &str,
    link: &crate::model::Link,
) -> CoreResult<()> {
    let row = ExportRow {
        doc_url: doc_url.to_string(),
        page_id: page_id.unwrap_or_default().to_string(),
        snippet: snippet.to_string(),
        verbatim: link.verbatim.clone(),
        spec_num: link.spec_num.clone(),
        ezid: link.ezid.clone().unwrap_or_default(),
        match_quality: link.match_quality.clone().unwrap_or_default(),
        department: link.department.clone().unwrap_or_default(),
    };
    writer.serialize(&row).map_err(|e| CoreError::ExternalIo(format!("cannot write export row: {e}")))
}

/// `report <source>`: one citation line per matched specimen, for every
/// document whose `kind` (the source-corpus tag it was mined from, §6)
/// equals `source`.
pub async fn citation_report(storage: &dyn Storage, source: &str) -> CoreResult<Vec<String>> {
    let mut lines = Vec::new();
    for doc in storage.all_documents().await? {
        if doc.kind.as_deref() != Some(source) {
            continue;
        }
        let citation = format_citation(&doc);
        for link in storage.links_for_document(&doc.url).await? {
            let Some(ezid) = &link.ezid else { continue };
            lines.push(format!("{citation}\t{}\t{ezid}", link.spec_num));
        }
    }
    Ok(lines)
}

fn format_citation(doc: &crate::model::Document) -> String {
    let authors = doc.authors.as_deref().unwrap_or("Unknown author");
    let year = doc.year.as_deref().unwrap_or("n.d.");
    let title = doc.title.as_deref().unwrap_or_else(|| doc.url.as_str());
    let publication = doc.publication.as_deref().unwrap_or("");
    let mut citation = format!("{authors} ({year}). {title}.");
    if !publication.is_empty() {
        citation.push_str(&format!(" {publication}."));
    }
    if let Some(vol) = &doc.volume {
        citation.push_str(&format!(" {vol}"));
        if let Some(num) = &doc.number {
            citation.push_str(&format!("({num})"));
        }
    }
    if let Some(pages) = &doc.pages {
        citation.push_str(&format!(": {pages}."));
    }
    citation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Link, Snippet};
    use crate::storage_memory::StorageMemory;

    #[tokio::test]
    async fn export_pairs_links_with_their_matching_snippets() {
        let storage = StorageMemory::new();
        storage.upsert_document(&Document::new("https://doc/1")).await.unwrap();
        storage
            .upsert_snippet(&Snippet {
                id: "s1".into(),
                doc_url: "https://doc/1".into(),
                page_id: Some("1".into()),
                snippet: "A specimen, USNM 123456, was found.".into(),
                notes: None,
            })
            .await
            .unwrap();
        let mut link = Link::new("https://doc/1", "USNM 123456", "USNM 123456");
        link.ezid = Some("urn:1".into());
        storage.upsert_link(&link).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_links(&storage, &path).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("USNM 123456"));
        assert!(contents.contains("urn:1"));
    }

    #[tokio::test]
    async fn report_filters_by_source_and_lists_matched_specimens() {
        let storage = StorageMemory::new();
        let mut doc = Document::new("https://doc/2");
        doc.kind = Some("bhl".into());
        doc.authors = Some("Smith, J.".into());
        doc.year = Some("1932".into());
        doc.title = Some("Notes on Foraminifera".into());
        storage.upsert_document(&doc).await.unwrap();
        let mut link = Link::new("https://doc/2", "USNM 123456", "USNM 123456");
        link.ezid = Some("urn:1".into());
        storage.upsert_link(&link).await.unwrap();
        let unmatched = Link::new("https://doc/2", "USNM 999", "USNM 999");
        storage.upsert_link(&unmatched).await.unwrap();

        let lines = citation_report(&storage, "bhl").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Smith, J. (1932)"));
        assert!(lines[0].contains("USNM 123456"));
        assert!(lines[0].contains("urn:1"));

        assert!(citation_report(&storage, "gdd").await.unwrap().is_empty());
    }
}
