use regex::{Captures, Regex};
use tracing::warn;
use url::Url;

use crate::error::InspectorError;
use crate::field::field_model::FieldDetail;
use crate::inspect::collaborators::FrameInfo;
use crate::tagger::identity::INSPECT_ATTRIBUTE;

/// Frames to freeze, in freeze order: the direct, non-`about:` subframes of
/// the main frame first, the main frame last.
pub fn select_frames_for_freeze(frames: &[FrameInfo]) -> Result<Vec<FrameInfo>, InspectorError> {
    let main = frames
        .iter()
        .find(|f| f.is_main())
        .ok_or_else(|| InspectorError::PageAgent("tab has no main frame".into()))?;

    let mut selected: Vec<FrameInfo> = frames
        .iter()
        .filter(|f| f.parent_frame_id == main.frame_id && !f.url.starts_with("about:"))
        .cloned()
        .collect();
    selected.push(main.clone());
    Ok(selected)
}

/// `host[:port]` of a frame URL.
pub fn frame_host(url: &str) -> Result<String, InspectorError> {
    let parsed = Url::parse(url)
        .map_err(|e| InspectorError::PageAgent(format!("invalid frame url '{}': {}", url, e)))?;
    let host = parsed.host_str().unwrap_or_default();
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// File name of the frozen frame at position `index` of `count` frames:
/// `<host>/<index>.html` for subframes, `<host>.html` for the main frame.
pub fn frozen_page_filename(url: &str, index: usize, count: usize) -> Result<String, InspectorError> {
    let host = frame_host(url)?;
    if index + 1 == count {
        Ok(format!("{}.html", host))
    } else {
        Ok(format!("{}/{}.html", host, index))
    }
}

/// `(inspectId, fieldName)` pairs of the fields living in `frame_id`.
pub fn field_types_for_frame(fields: &[FieldDetail], frame_id: i64) -> Vec<(String, String)> {
    fields
        .iter()
        .filter(|f| f.frame_id == frame_id)
        .map(|f| (f.inspect_id.clone(), f.field_name.clone()))
        .collect()
}

/// Make the frozen main frame loadable from disk: iframe sources point at the
/// frozen subframe files, `frame-src` allows `'self'`, and inspect ids are
/// removed.
pub fn post_process_main_frame_html(html: &str, url_to_path: &[(String, String)]) -> String {
    let mut html = html.to_string();

    for (url, path) in url_to_path {
        let escaped = regex::escape(&url.replace('&', "&amp;"));
        let pattern = format!(r#"(?i)<iframe\s+[^>]*src=["']({})["']"#, escaped);
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Skipping iframe rewrite for {}: {}", url, e);
                continue;
            }
        };
        html = re
            .replace(&html, |caps: &Captures| caps[0].replacen(&caps[1], path, 1))
            .into_owned();
    }

    html = html.replacen("frame-src", "frame-src 'self'", 1);

    match Regex::new(&format!(r#"\s?{}="[^"]*""#, regex::escape(INSPECT_ATTRIBUTE))) {
        Ok(re) => re.replace_all(&html, "").into_owned(),
        Err(e) => {
            warn!("Could not strip inspect ids: {}", e);
            html
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame_id: i64, parent: i64, url: &str) -> FrameInfo {
        FrameInfo {
            frame_id,
            parent_frame_id: parent,
            url: url.to_string(),
        }
    }

    #[test]
    fn main_frame_is_frozen_last() {
        let frames = vec![
            frame(0, -1, "https://shop.test/"),
            frame(1, 0, "https://pay.test/card"),
            frame(2, 0, "about:blank"),
            frame(3, 1, "https://nested.test/"),
        ];
        let order: Vec<i64> = select_frames_for_freeze(&frames)
            .unwrap()
            .iter()
            .map(|f| f.frame_id)
            .collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn missing_main_frame_is_an_error() {
        let frames = vec![frame(1, 0, "https://pay.test/card")];
        assert!(select_frames_for_freeze(&frames).is_err());
    }

    #[test]
    fn filenames_keep_port() {
        assert_eq!(
            frozen_page_filename("http://localhost:8080/form", 0, 2).unwrap(),
            "localhost:8080/0.html"
        );
        assert_eq!(
            frozen_page_filename("https://shop.test/checkout", 1, 2).unwrap(),
            "shop.test.html"
        );
    }

    #[test]
    fn rewrites_only_the_matching_iframe() {
        let html = r#"<iframe id="a" src="https://pay.test/card?x=1&amp;y=2"></iframe><iframe src="https://other.test/"></iframe>"#;
        let mapping = vec![(
            "https://pay.test/card?x=1&y=2".to_string(),
            "pay.test/0.html".to_string(),
        )];
        let out = post_process_main_frame_html(html, &mapping);
        assert!(out.contains(r#"<iframe id="a" src="pay.test/0.html">"#), "got: {}", out);
        assert!(out.contains(r#"src="https://other.test/""#));
    }

    #[test]
    fn widens_csp_and_strips_ids() {
        let html = r#"<meta http-equiv="Content-Security-Policy" content="frame-src https:"><input data-moz-autofill-inspect-id="1234-abcd" name="email">"#;
        let out = post_process_main_frame_html(html, &[]);
        assert!(out.contains("frame-src 'self' https:"));
        assert!(!out.contains(INSPECT_ATTRIBUTE));
        assert!(out.contains(r#"<input name="email">"#), "got: {}", out);
    }
}
