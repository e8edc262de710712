//! Discovery of downloadable files in an HTML directory index.

use anyhow::{bail, Context, Result};
use reqwest::header::ACCEPT_ENCODING;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::utils::get_filename_from_url;

/// A file found in a directory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Local file name.
    pub name: String,
    /// Absolute URL of the file.
    pub url: String,
}

/// Whether an index hyperlink points at a file. Sort links (`?C=N;O=D`),
/// anchors, sub-directories and the parent link are skipped.
pub fn is_file_link(href: &str) -> bool {
    !(href.is_empty() || href.starts_with('?') || href.starts_with('#') || href.ends_with('/') || href == "..")
}

/// Hyperlink targets of an index page that name files, in page order.
pub fn parse_listing(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_file_link(href))
        .map(str::to_string)
        .collect()
}

/// Directory URL with a trailing slash so relative links resolve inside it.
pub fn directory_base(url: &str) -> Result<Url> {
    let mut base = Url::parse(url).with_context(|| format!("Invalid directory URL: {}", url))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Resolves `hrefs` against `base` into listing entries. Links that leave
/// the index's origin (server footers, mirrors lists) are dropped.
pub fn resolve_entries(base: &Url, hrefs: &[String]) -> Result<Vec<ListingEntry>> {
    let mut entries = Vec::with_capacity(hrefs.len());
    for href in hrefs {
        let url = base
            .join(href)
            .with_context(|| format!("Invalid link {:?} in {}", href, base))?;
        if url.origin() != base.origin() {
            debug!("Ignoring off-site link {}", url);
            continue;
        }
        let name = get_filename_from_url(url.as_str())?;
        entries.push(ListingEntry {
            name,
            url: url.to_string(),
        });
    }
    Ok(entries)
}

/// Fetches the index page at `url` and returns the files it links to.
pub async fn fetch_listing(client: &Client, url: &str) -> Result<Vec<ListingEntry>> {
    let base = directory_base(url)?;

    let response = client
        .get(base.clone())
        .header(ACCEPT_ENCODING, "identity")
        .send()
        .await
        .with_context(|| format!("Failed to request directory listing {}", base))?;

    if !response.status().is_success() {
        bail!("Directory listing {} returned HTTP {}", base, response.status());
    }

    let body = response.text().await.context("Failed to read directory listing")?;
    let hrefs = parse_listing(&body);
    debug!("Found {} file link(s) in {}", hrefs.len(), base);

    resolve_entries(&base, &hrefs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body><h1>Index of /pub/data</h1><pre>
        <a href="?C=N;O=D">Name</a> <a href="?C=M;O=A">Last modified</a>
        <a href="../">Parent Directory</a>
        <a href="subdir/">subdir/</a>
        <a href="file.txt">file.txt</a>
        </pre></body></html>"#;

    #[test]
    fn test_only_files_survive_the_filter() {
        assert_eq!(parse_listing(INDEX), vec!["file.txt".to_string()]);
    }

    #[test]
    fn test_link_order_is_preserved() {
        let html = r##"<a href="b.bin">b</a><a href="#top">top</a><a href="a.bin">a</a><a>no href</a>"##;
        assert_eq!(parse_listing(html), vec!["b.bin".to_string(), "a.bin".to_string()]);
    }

    #[test]
    fn test_entries_resolve_against_directory() {
        let base = directory_base("http://mirror.local/pub/data").unwrap();
        assert_eq!(base.as_str(), "http://mirror.local/pub/data/");

        let entries = resolve_entries(
            &base,
            &["file.txt".to_string(), "my%20notes.md".to_string(), "/abs/x.iso".to_string()],
        )
        .unwrap();

        assert_eq!(entries[0].url, "http://mirror.local/pub/data/file.txt");
        assert_eq!(entries[0].name, "file.txt");
        assert_eq!(entries[1].name, "my_notes.md");
        assert_eq!(entries[2].url, "http://mirror.local/abs/x.iso");
    }

    #[test]
    fn test_links_to_other_hosts_are_dropped() {
        let base = directory_base("http://mirror.local/pub/data/").unwrap();
        let entries = resolve_entries(
            &base,
            &[
                "https://nginx.org/en/download.tar.gz".to_string(),
                "https://mirror.local/pub/data/other-scheme.bin".to_string(),
                "http://mirror.local/pub/data/keep.bin".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "keep.bin");
    }
}
