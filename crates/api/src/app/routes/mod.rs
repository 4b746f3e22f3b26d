use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub mod blogs;
pub mod comments;
pub mod system;
pub mod uploads;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Router for everything under `/api`.
///
/// Reads are public; mutating handlers require a [`RequesterContext`](crate::context::RequesterContext).
pub fn router(max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/blogs", blogs::router())
        .nest("/comments", comments::router())
        .route(
            "/upload/image",
            post(uploads::upload_image)
                .layer(DefaultBodyLimit::max(upload_body_limit(max_upload_bytes))),
        )
}

fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_leaves_room_for_multipart_framing() {
        assert_eq!(upload_body_limit(1024), 1024 + MULTIPART_OVERHEAD_BYTES);
    }

    #[test]
    fn unbounded_upload_size_saturates() {
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
        let _ = router(usize::MAX);
    }
}
