//! Splitting a model response into the three bundle blobs.
//!
//! Generation prompts ask for fenced `html`, `css`, and `js` blocks; this
//! parser collects them. A response with no recognizable fences lands whole
//! in the structure blob so a sloppy model still yields something renderable.

/// The three blobs of one generated bundle, before version assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleParts {
    pub structure: String,
    pub styling: String,
    pub behavior: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Blob {
    Structure,
    Styling,
    Behavior,
}

fn blob_for_fence(info: &str) -> Option<Blob> {
    match info.trim().to_ascii_lowercase().as_str() {
        "html" => Some(Blob::Structure),
        "css" => Some(Blob::Styling),
        "js" | "javascript" => Some(Blob::Behavior),
        _ => None,
    }
}

/// Extract the bundle blobs from a model response.
#[must_use]
pub fn extract_bundle(response: &str) -> BundleParts {
    let mut parts = BundleParts::default();
    let mut active: Option<Blob> = None;

    for line in response.lines() {
        let trimmed = line.trim_start();
        if let Some(info) = trimmed.strip_prefix("```") {
            match active {
                Some(_) => active = None,
                None => active = blob_for_fence(info),
            }
            continue;
        }

        let buffer = match active {
            Some(Blob::Structure) => &mut parts.structure,
            Some(Blob::Styling) => &mut parts.styling,
            Some(Blob::Behavior) => &mut parts.behavior,
            None => continue,
        };
        buffer.push_str(line);
        buffer.push('\n');
    }

    if parts.structure.is_empty() && parts.styling.is_empty() && parts.behavior.is_empty() {
        parts.structure = response.to_string();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_three_blobs() {
        let response = "Intro text.\n\n```html\n<html></html>\n```\n\n```css\nbody {}\n```\n\n```js\nconsole.log(1);\n```\n";
        let parts = extract_bundle(response);
        assert_eq!(parts.structure.trim(), "<html></html>");
        assert_eq!(parts.styling.trim(), "body {}");
        assert_eq!(parts.behavior.trim(), "console.log(1);");
    }

    #[test]
    fn javascript_fence_is_accepted() {
        let parts = extract_bundle("```javascript\nlet a = 1;\n```");
        assert_eq!(parts.behavior.trim(), "let a = 1;");
    }

    #[test]
    fn repeated_fences_of_one_language_concatenate() {
        let parts = extract_bundle("```css\na {}\n```\ntext\n```css\nb {}\n```");
        assert!(parts.styling.contains("a {}"));
        assert!(parts.styling.contains("b {}"));
    }

    #[test]
    fn unknown_fences_are_ignored() {
        let parts = extract_bundle("```python\nprint('no')\n```\n```html\n<p>yes</p>\n```");
        assert!(!parts.structure.contains("print"));
        assert!(parts.structure.contains("<p>yes</p>"));
    }

    #[test]
    fn fenceless_response_falls_back_to_structure() {
        let parts = extract_bundle("<html>bare</html>");
        assert_eq!(parts.structure, "<html>bare</html>");
        assert!(parts.styling.is_empty());
    }
}
