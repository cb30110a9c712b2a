const FORM_HOSTS: &[&str] = &["forms.office.com"];
const MEDIA_HOSTS: &[&str] = &["youtube.com", "youtu.be", "spotify.com"];
const EMBED_FLAG: &str = "embed=true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedSource {
    /// The link field already held iframe markup.
    Markup,
    Form,
    Media,
}

/// What a post's link field turns into. Embeds and link-outs exclude each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    None,
    Embed { markup: String, source: EmbedSource },
    LinkOut(String),
}

impl LinkTarget {
    pub fn embed(&self) -> Option<&str> {
        match self {
            Self::Embed { markup, .. } => Some(markup),
            _ => None,
        }
    }

    pub fn link_out(&self) -> Option<&str> {
        match self {
            Self::LinkOut(url) => Some(url),
            _ => None,
        }
    }

    /// Forms and hand-written markup are rendered as polls.
    pub fn is_poll(&self) -> bool {
        matches!(
            self,
            Self::Embed {
                source: EmbedSource::Markup | EmbedSource::Form,
                ..
            }
        )
    }
}

pub fn classify_link(raw: &str) -> LinkTarget {
    let link = raw.trim();
    if link.is_empty() {
        return LinkTarget::None;
    }

    if starts_with_ignore_case(link, "<iframe") {
        return LinkTarget::Embed {
            markup: link.to_string(),
            source: EmbedSource::Markup,
        };
    }

    let lowered = link.to_ascii_lowercase();
    if FORM_HOSTS.iter().any(|host| lowered.contains(host)) {
        let url = with_embed_flag(&with_scheme(link));
        return LinkTarget::Embed {
            markup: format!(
                "<iframe src=\"{url}\" width=\"640\" height=\"480\" frameborder=\"0\" style=\"border:none; max-width:100%; height:520px\" allowfullscreen></iframe>"
            ),
            source: EmbedSource::Form,
        };
    }

    if MEDIA_HOSTS.iter().any(|host| lowered.contains(host)) {
        return LinkTarget::Embed {
            markup: format!("<iframe src=\"{link}\" frameborder=\"0\" allowfullscreen></iframe>"),
            source: EmbedSource::Media,
        };
    }

    LinkTarget::LinkOut(link.to_string())
}

fn with_scheme(url: &str) -> String {
    if starts_with_ignore_case(url, "http://") || starts_with_ignore_case(url, "https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn with_embed_flag(url: &str) -> String {
    if url.to_ascii_lowercase().contains(EMBED_FLAG) {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{EMBED_FLAG}")
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::{EmbedSource, LinkTarget, classify_link};

    fn embed_src(target: &LinkTarget) -> String {
        let markup = target.embed().expect("embed markup");
        let start = markup.find("src=\"").expect("src attribute") + 5;
        let end = markup[start..].find('"').expect("closing quote") + start;
        markup[start..end].to_string()
    }

    #[test]
    fn empty_link_is_neither_embed_nor_link() {
        assert_eq!(classify_link("   "), LinkTarget::None);
    }

    #[test]
    fn existing_iframe_markup_passes_through() {
        let markup = "<iframe src=\"https://example.org/widget\"></iframe>";
        let target = classify_link(&format!("  {markup} "));
        assert_eq!(target.embed(), Some(markup));
        assert!(target.is_poll());
    }

    #[test]
    fn form_links_gain_scheme_and_embed_flag() {
        let bare = classify_link("forms.office.com/r/AbC123");
        assert_eq!(embed_src(&bare), "https://forms.office.com/r/AbC123?embed=true");
        assert!(bare.is_poll());

        let with_query = classify_link("https://forms.office.com/Pages/ResponsePage.aspx?id=xyz");
        assert!(embed_src(&with_query).ends_with("&embed=true"));

        let already = classify_link("https://forms.office.com/r/x?embed=true");
        assert_eq!(embed_src(&already), "https://forms.office.com/r/x?embed=true");
        assert!(already.embed().expect("markup").contains("width=\"640\""));
    }

    #[test]
    fn media_hosts_embed_without_fixed_size() {
        let target = classify_link("https://www.youtube.com/embed/abc");
        let markup = target.embed().expect("markup");
        assert!(markup.contains("allowfullscreen"));
        assert!(!markup.contains("width="));
        assert!(matches!(
            target,
            LinkTarget::Embed {
                source: EmbedSource::Media,
                ..
            }
        ));
        assert!(!target.is_poll());
    }

    #[test]
    fn other_links_become_link_outs() {
        let target = classify_link("https://example.com/article");
        assert_eq!(target.link_out(), Some("https://example.com/article"));
        assert_eq!(target.embed(), None);
    }
}
