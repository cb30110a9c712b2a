pub mod config;
pub mod dates;
pub mod embed;
pub mod frontmatter;
pub mod github;
pub mod issues;
pub mod media;
pub mod runtime;
pub mod slug;
pub mod table;
pub mod tags;
