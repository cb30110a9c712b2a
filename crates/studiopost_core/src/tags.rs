use crate::embed::LinkTarget;

pub const TAG_MUSIC: &str = "music";
pub const TAG_PHOTOGRAPHY: &str = "photography";
pub const TAG_ART: &str = "art";
pub const TAG_POLL: &str = "poll";

/// Map a free-text post type to its tag, if it has one.
pub fn post_type_tag(post_type: &str) -> Option<&'static str> {
    match post_type.trim().to_lowercase().as_str() {
        "music" => Some(TAG_MUSIC),
        "photo" | "photos" => Some(TAG_PHOTOGRAPHY),
        "art" => Some(TAG_ART),
        _ => None,
    }
}

/// Ordered tag set for a post: the post-type tag first, then `poll`.
pub fn derive_tags(post_type: &str, link: &LinkTarget) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(tag) = post_type_tag(post_type) {
        tags.push(tag.to_string());
    }
    if link.is_poll() {
        tags.push(TAG_POLL.to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::{derive_tags, post_type_tag};
    use crate::embed::classify_link;

    #[test]
    fn post_types_map_to_at_most_one_tag() {
        assert_eq!(post_type_tag(" Music "), Some("music"));
        assert_eq!(post_type_tag("PHOTOS"), Some("photography"));
        assert_eq!(post_type_tag("photo"), Some("photography"));
        assert_eq!(post_type_tag("art"), Some("art"));
        assert_eq!(post_type_tag("poetry"), None);
        assert_eq!(post_type_tag(""), None);
    }

    #[test]
    fn forms_and_markup_add_poll_tag() {
        let form = classify_link("forms.office.com/r/abc");
        assert_eq!(derive_tags("music", &form), vec!["music", "poll"]);

        let markup = classify_link("<iframe src=\"x\"></iframe>");
        assert_eq!(derive_tags("", &markup), vec!["poll"]);

        let video = classify_link("https://youtu.be/abc");
        assert_eq!(derive_tags("art", &video), vec!["art"]);

        let plain = classify_link("https://example.com");
        assert!(derive_tags("other", &plain).is_empty());
    }
}
