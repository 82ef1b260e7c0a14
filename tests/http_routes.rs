use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE, LINK, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use quillpress::application::auth::{AccountDirectory, AuthService, hash_password};
use quillpress::application::comments::CommentService;
use quillpress::application::content::ContentResolver;
use quillpress::application::posts::{CreatePostCommand, PostService};
use quillpress::application::repos::FileCatalog;
use quillpress::application::seo::SeoBuilder;
use quillpress::application::session::SessionAuthority;
use quillpress::application::site::SiteIdentity;
use quillpress::application::sitemap::SitemapService;
use quillpress::application::slugs::SlugResolver;
use quillpress::domain::entities::{PostRecord, UserRecord};
use quillpress::domain::types::Role;
use quillpress::infra::cache::PostCache;
use quillpress::infra::files::LocalFileCatalog;
use quillpress::infra::http::{HttpState, build_router};
use quillpress::infra::memory::MemoryRepositories;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    router: Router,
    posts: Arc<PostService>,
    comments: Arc<CommentService>,
    uploads: TempDir,
}

impl Harness {
    fn new() -> Self {
        let uploads = tempfile::tempdir().expect("tempdir");
        let url = Url::parse("https://blog.example.com/").expect("url");
        let site = Arc::new(SiteIdentity::new(
            &url,
            "Example Blog",
            "Ada",
            "Notes from the workshop",
        ));
        let memory = Arc::new(MemoryRepositories::new());

        let cache = Some(Arc::new(PostCache::new(
            std::num::NonZeroUsize::new(64).expect("capacity"),
        )));
        let content = Arc::new(ContentResolver::new(
            memory.clone(),
            cache,
            site.clone(),
            TIMEOUT,
        ));
        let slugs = Arc::new(SlugResolver::new(memory.clone(), TIMEOUT));
        let posts = Arc::new(PostService::new(
            memory.clone(),
            memory.clone(),
            slugs,
            content.clone(),
            TIMEOUT,
        ));
        let comments = Arc::new(CommentService::new(memory.clone(), memory.clone(), TIMEOUT));

        let accounts = vec![
            account("admin", "hunter2", Role::Admin),
            account("reader", "letmein", Role::User),
        ];
        let directory = Arc::new(AccountDirectory::new(accounts, None));
        let sessions = Arc::new(SessionAuthority::new(time::Duration::hours(1)));
        let auth = Arc::new(AuthService::new(directory, sessions, TIMEOUT).expect("auth"));

        let catalog = Arc::new(LocalFileCatalog::new(
            uploads.path().to_path_buf(),
            "/uploads",
            site.clone(),
        ));
        let files: Arc<dyn FileCatalog> = catalog.clone();

        let state = HttpState {
            site: site.clone(),
            content,
            seo: Arc::new(SeoBuilder::new(site.clone(), files.clone())),
            files,
            uploads: catalog,
            sitemap: Arc::new(SitemapService::new(memory.clone(), site, TIMEOUT)),
            posts: posts.clone(),
            comments: comments.clone(),
            auth,
            health: memory,
            storage_timeout: TIMEOUT,
            secure_cookie: false,
        };

        Self {
            router: build_router(state),
            posts,
            comments,
            uploads,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.to_string())).expect("request"))
            .await
    }

    /// Log in and return the `Cookie` header value for later requests.
    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_form(
                "/login",
                &format!("username={username}&password={password}"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let set_cookie = response.headers()[SET_COOKIE].to_str().expect("ascii");
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    async fn create(&self, title: &str, body: &str) -> PostRecord {
        self.posts
            .create(
                "admin",
                CreatePostCommand {
                    title: title.to_string(),
                    body: body.to_string(),
                    meta_description: None,
                    keywords: None,
                },
            )
            .await
            .expect("create post")
    }
}

fn account(name: &str, password: &str, role: Role) -> UserRecord {
    UserRecord {
        name: name.to_string(),
        password_hash: hash_password(password).expect("hash"),
        role,
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().expect("ascii")
}

#[tokio::test]
async fn admin_creates_post_and_reads_it_by_slug() {
    let harness = Harness::new();
    let cookie = harness.login("admin", "hunter2").await;

    let response = harness
        .post_form(
            "/create",
            "title=My+Awesome+New+Post&body=First+paragraph.",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/p/my-awesome-new-post");

    let response = harness.get("/p/my-awesome-new-post", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[LINK],
        "<https://blog.example.com/p/my-awesome-new-post>; rel=\"canonical\""
    );
    let html = body_text(response).await;
    assert!(html.contains("My Awesome New Post"));
    assert!(html.contains("First paragraph."));
    assert!(html.contains(
        "<link rel=\"canonical\" href=\"https://blog.example.com/p/my-awesome-new-post\">"
    ));
}

#[tokio::test]
async fn duplicate_titles_get_numbered_slugs() {
    let harness = Harness::new();
    let cookie = harness.login("admin", "hunter2").await;

    for expected in ["/p/same-title", "/p/same-title-2", "/p/same-title-3"] {
        let response = harness
            .post_form("/create", "title=Same+Title&body=Text", Some(&cookie))
            .await;
        assert_eq!(location(&response), expected);
    }
}

#[tokio::test]
async fn empty_and_unknown_slugs_are_rejected() {
    let harness = Harness::new();

    assert_eq!(
        harness.get("/p/", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        harness.get("/p/does-not-exist", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn authoring_requires_an_admin_session() {
    let harness = Harness::new();

    let response = harness
        .post_form("/create", "title=Sneaky&body=Nope", None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let reader = harness.login("reader", "letmein").await;
    let response = harness
        .post_form("/create", "title=Sneaky&body=Nope", Some(&reader))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        harness.get("/p/sneaky", None).await.status(),
        StatusCode::NOT_FOUND
    );

    let admin = harness.login("admin", "hunter2").await;
    assert_eq!(harness.get("/create", Some(&admin)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn blank_title_rerenders_form_with_bad_request() {
    let harness = Harness::new();
    let cookie = harness.login("admin", "hunter2").await;

    let response = harness
        .post_form("/create", "title=+++&body=Kept+text", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("Kept text"));
}

#[tokio::test]
async fn deleted_posts_leave_the_sitemap_and_stop_resolving() {
    let harness = Harness::new();
    let keep = harness.create("Keep Me", "Body").await;
    let drop = harness.create("Drop Me", "Body").await;
    let cookie = harness.login("admin", "hunter2").await;

    let response = harness
        .post_form("/delete", &format!("id={}", drop.id), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let response = harness.get("/sitemap.xml", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/xml; charset=utf-8"
    );
    let xml = body_text(response).await;
    assert!(xml.contains(&format!("https://blog.example.com/p/{}", keep.slug)));
    assert!(!xml.contains(&drop.slug));

    assert_eq!(
        harness.get("/p/drop-me", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn sitemap_lists_every_live_post() {
    let harness = Harness::new();
    for n in 1..=100 {
        harness.create(&format!("Entry {n}"), "Body").await;
    }

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        harness.get("/sitemap.xml", None),
    )
    .await
    .expect("sitemap for 100 posts renders within the time budget");
    let xml = body_text(response).await;
    assert_eq!(xml.matches("<url>").count(), 101);
    assert!(xml.contains("https://blog.example.com/p/entry-100"));
}

#[tokio::test]
async fn robots_points_at_the_sitemap() {
    let harness = Harness::new();

    let response = harness.get("/robots.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=86400");
    let text = body_text(response).await;
    assert!(text.starts_with("User-agent: *\n"));
    assert!(text.contains("Sitemap: https://blog.example.com/sitemap.xml"));
}

#[tokio::test]
async fn sitemap_carries_caching_headers() {
    let harness = Harness::new();
    harness.create("Cached", "Body").await;

    let response = harness.get("/sitemap.xml", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/xml; charset=utf-8"
    );
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=3600");
}

#[tokio::test]
async fn head_requests_mirror_get_headers_without_a_body() {
    let harness = Harness::new();
    harness.create("Headed", "Body").await;

    for (uri, content_type, cache_control) in [
        (
            "/sitemap.xml",
            "application/xml; charset=utf-8",
            "public, max-age=3600",
        ),
        (
            "/robots.txt",
            "text/plain; charset=utf-8",
            "public, max-age=86400",
        ),
    ] {
        let request = Request::builder()
            .method(Method::HEAD)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = harness.send(request).await;

        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(response.headers()[CONTENT_TYPE], content_type, "{uri}");
        assert_eq!(response.headers()[CACHE_CONTROL], cache_control, "{uri}");
        assert!(body_text(response).await.is_empty(), "{uri}");
    }
}

#[tokio::test]
async fn id_addresses_redirect_permanently_to_the_slug() {
    let harness = Harness::new();
    let post = harness.create("Legacy Link", "Body").await;

    let response = harness.get(&format!("/post?id={}", post.id), None).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/p/legacy-link");

    assert_eq!(
        harness.get("/post?id=abc", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        harness.get("/post", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        harness.get("/post?id=999999", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn markup_in_titles_and_bodies_is_escaped() {
    let harness = Harness::new();
    let post = harness
        .create("<script>alert(1)</script>", "<img src=x onerror=alert(2)>")
        .await;

    let html = body_text(harness.get(&format!("/p/{}", post.slug), None).await).await;
    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(!html.contains("<img src=x"));
    assert!(html.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn page_parameter_is_validated() {
    let harness = Harness::new();
    harness.create("Only Post", "Body").await;

    assert_eq!(
        harness.get("/page?p=abc", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        harness.get("/page?p=0", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(harness.get("/page?p=1", None).await.status(), StatusCode::OK);

    let response = harness.get("/page?p=7", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("Only Post"));

    let home = body_text(harness.get("/", None).await).await;
    assert!(home.contains("Only Post"));
}

#[tokio::test]
async fn failed_logins_look_the_same() {
    let harness = Harness::new();

    for form in [
        "username=admin&password=wrong",
        "username=nobody&password=hunter2",
    ] {
        let response = harness.post_form("/login", form, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert!(
            body_text(response)
                .await
                .contains("Invalid username or password")
        );
    }
}

#[tokio::test]
async fn session_cookie_attributes() {
    let harness = Harness::new();

    let response = harness
        .post_form("/login", "username=admin&password=hunter2", None)
        .await;
    assert_eq!(location(&response), "/");
    let cookie = response.headers()[SET_COOKIE].to_str().expect("ascii");
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn logout_clears_cookie_and_revokes_session() {
    let harness = Harness::new();
    let cookie = harness.login("admin", "hunter2").await;

    let response = harness.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let removal = response.headers()[SET_COOKIE].to_str().expect("ascii");
    assert!(removal.starts_with("session="));
    assert!(removal.contains("Max-Age=0"));

    let response = harness
        .post_form("/create", "title=After&body=Logout", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness.get("/logout", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn signed_in_users_comment_and_admins_moderate() {
    let harness = Harness::new();
    let post = harness.create("Discuss", "Talk below.").await;

    let response = harness
        .post_form(
            "/create-comment",
            &format!("post_id={}&body=Nice", post.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let reader = harness.login("reader", "letmein").await;
    let response = harness
        .post_form(
            "/create-comment",
            &format!("post_id={}&body=Great+read", post.id),
            Some(&reader),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/p/discuss");

    let html = body_text(harness.get("/p/discuss", None).await).await;
    assert!(html.contains("Great read"));
    assert!(html.contains("reader"));

    let comments = harness.comments.for_post(post.id).await.expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author, "reader");
    let comment_id = comments[0].id;
    assert_eq!(
        harness
            .get(&format!("/delete-comment?id={comment_id}"), Some(&reader))
            .await
            .status(),
        StatusCode::UNAUTHORIZED
    );

    let admin = harness.login("admin", "hunter2").await;
    let response = harness
        .get(&format!("/delete-comment?id={comment_id}"), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/p/discuss");

    let html = body_text(harness.get("/p/discuss", None).await).await;
    assert!(!html.contains("Great read"));
}

#[tokio::test]
async fn health_and_uploads() {
    let harness = Harness::new();
    std::fs::write(harness.uploads.path().join("notes.txt"), "plain notes").expect("write");

    assert_eq!(
        harness.get("/_health", None).await.status(),
        StatusCode::NO_CONTENT
    );

    let response = harness.get("/uploads/notes.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .expect("ascii")
            .starts_with("text/plain")
    );
    assert_eq!(body_text(response).await, "plain notes");

    assert_eq!(
        harness.get("/uploads/missing.png", None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        harness.get("/nowhere", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn unsupported_methods_are_not_found() {
    let harness = Harness::new();
    let admin = harness.login("admin", "hunter2").await;

    let response = harness.get("/create-comment", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Nothing lives at this address."));

    assert_eq!(
        harness
            .post_form("/sitemap.xml", "", None)
            .await
            .status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        harness
            .post_form("/delete-comment", "id=1", Some(&admin))
            .await
            .status(),
        StatusCode::NOT_FOUND
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/create")
        .header(COOKIE, admin.as_str())
        .body(Body::empty())
        .expect("request");
    assert_eq!(harness.send(request).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn file_references_render_as_figures() {
    let harness = Harness::new();
    std::fs::write(harness.uploads.path().join("cat.png"), [0x89, b'P', b'N', b'G']).expect("write");
    let post = harness
        .create("Cat Photo", "Look at this.\n\n{{file:cat.png}}\n\n{{file:ghost.pdf}}")
        .await;

    let html = body_text(harness.get(&format!("/p/{}", post.slug), None).await).await;
    assert!(html.contains("<figure>"));
    assert!(html.contains("uploads/cat.png"));
    assert!(html.contains("og:image"));
    assert!(html.contains("ghost.pdf"));
}
