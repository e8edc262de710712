use anyhow::Result;
use percent_encoding::percent_decode_str;
use url::Url;

/// Last path segment of `url_str`, percent-decoded and made safe for the
/// local filesystem.
pub fn get_filename_from_url(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)?;

    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.last() {
            let decoded = percent_decode_str(filename).decode_utf8_lossy();
            let sanitized = sanitize_filename(&decoded);
            if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
                return Ok(sanitized);
            }
        }
    }

    // Fallback if no filename found in path
    Ok(format!("download_{}", uuid::Uuid::new_v4()))
}

/// Name of the folder a directory URL is mirrored into: its last non-empty
/// path segment, or the host when the path is the root.
pub fn folder_name_from_url(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)?;

    let last = url
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .unwrap_or_default();

    let name = if last.is_empty() {
        url.host_str().unwrap_or("download").to_string()
    } else {
        last
    };
    Ok(sanitize_filename(&name))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_extraction() {
        assert_eq!(get_filename_from_url("https://example.com/pub/archive.zip").unwrap(), "archive.zip");
        assert_eq!(
            get_filename_from_url("https://example.com/image.png?id=123&quality=high").unwrap(),
            "image.png"
        );
        assert_eq!(
            get_filename_from_url("https://example.com/my%20photo.jpg").unwrap(),
            "my_photo.jpg"
        );
        assert!(get_filename_from_url("https://example.com/")
            .unwrap()
            .starts_with("download_"));
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(folder_name_from_url("http://mirror.local/data/run42/").unwrap(), "run42");
        assert_eq!(folder_name_from_url("http://mirror.local/data/run42").unwrap(), "run42");
        assert_eq!(folder_name_from_url("http://mirror.local/").unwrap(), "mirror.local");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename("a b/c?.txt"), "a_b_c_.txt");
    }
}
