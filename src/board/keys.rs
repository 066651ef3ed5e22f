//! Cache keys of the board resources

use query_types::{QueryKey, query_key};

pub const POSTS: &str = "posts";
pub const POST: &str = "post";
pub const COMMENTS: &str = "comments";
pub const ME: &str = "me";

/// One page of the post list for a search keyword
pub fn posts_key(page: u32, keyword: &str) -> QueryKey {
    query_key!(POSTS, page, keyword)
}

/// Every page of every post list search
pub fn all_posts() -> QueryKey {
    query_key!(POSTS)
}

pub fn post_key(id: i64) -> QueryKey {
    query_key!(POST, id)
}

pub fn comments_key(post_id: i64) -> QueryKey {
    query_key!(COMMENTS, post_id)
}

pub fn me_key() -> QueryKey {
    query_key!(ME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keys_share_the_posts_prefix() {
        assert!(posts_key(0, "").matches(&all_posts()));
        assert!(posts_key(3, "rust").matches(&all_posts()));
        assert!(!post_key(1).matches(&all_posts()));
    }

    #[test]
    fn comment_keys_are_per_post() {
        assert!(comments_key(1).matches(&comments_key(1)));
        assert!(!comments_key(10).matches(&comments_key(1)));
    }

    #[test]
    fn keys_render_as_json_tuples() {
        assert_eq!(posts_key(0, "").to_string(), r#"["posts",0,""]"#);
        assert_eq!(me_key().to_string(), r#"["me"]"#);
    }
}
