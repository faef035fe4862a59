//! Integration tests for InlineKit using fixture files and wiremock

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use inlinekit::{
    inline_css, inline_html, CollectingSink, ErrorKind, InlineError, InlineRequest, Inliner,
    ReferenceKind, DEFAULT_USER_AGENT,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CASES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/cases/");

/// Route library logs to the test harness; `RUST_LOG=inlinekit=debug` to see them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn read_case(name: &str) -> String {
    std::fs::read_to_string(format!("{CASES}{name}")).unwrap()
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn pixel_uri() -> String {
    let bytes = std::fs::read(format!("{CASES}assets/pixel.png")).unwrap();
    data_uri("image/png", &bytes)
}

/// Replace only the `n`th (0-based) occurrence of `pattern`
fn replace_nth(text: &str, pattern: &str, n: usize, with: &str) -> String {
    let (index, _) = text.match_indices(pattern).nth(n).unwrap();
    format!("{}{}{}", &text[..index], with, &text[index + pattern.len()..])
}

// ============================================================================
// Stylesheets
// ============================================================================

#[tokio::test]
async fn test_inline_local_links() {
    let html = read_case("css.html");
    let css = read_case("assets/style.css");
    let expected = html.replace(
        r#"<link rel="stylesheet" href="assets/style.css">"#,
        &format!("<style>\n{css}\n</style>"),
    );

    let output = inline_html(InlineRequest::new(html, CASES)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
    assert!(!output.text.contains("<link"));
}

#[tokio::test]
async fn test_stylesheet_urls_rebased_when_images_off() {
    let html = read_case("css-images.html");
    let expected = html.replace(
        r#"<link href="assets/images.css" rel="stylesheet" media="screen" />"#,
        "<style media=\"screen\">\nbody {\n    background: url(assets/pixel.png) no-repeat;\n}\n\n</style>",
    );

    let output = inline_html(InlineRequest::new(html, CASES)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
}

#[tokio::test]
async fn test_stylesheet_urls_inlined_when_images_on() {
    let html = read_case("css-images.html");
    let expected = html.replace(
        r#"<link href="assets/images.css" rel="stylesheet" media="screen" />"#,
        &format!(
            "<style media=\"screen\">\nbody {{\n    background: url({}) no-repeat;\n}}\n\n</style>",
            pixel_uri()
        ),
    );

    let output = inline_html(InlineRequest::new(html, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
}

#[tokio::test]
async fn test_inline_remote_links() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("p { margin: 0; }")
                .insert_header("content-type", "text/css"),
        )
        .mount(&mock_server)
        .await;

    let html = format!(
        r#"<head><link rel="stylesheet" href="{}/style.css"></head>"#,
        mock_server.uri()
    );
    let output = inline_html(InlineRequest::new(html, CASES)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, "<head><style>\np { margin: 0; }\n</style></head>");
}

#[tokio::test]
async fn test_inline_remote_links_relative_to_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets/css/site.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("a { background: url(../img/dot.gif); }")
                .insert_header("content-type", "text/css"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/assets/img/dot.gif"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"GIF89a".to_vec())
                .insert_header("content-type", "image/gif"),
        )
        .mount(&mock_server)
        .await;

    let html = r#"<link rel="stylesheet" href="css/site.css">"#;
    let base = format!("{}/assets/", mock_server.uri());
    let output = inline_html(InlineRequest::new(html, base).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(
        output.text,
        format!(
            "<style>\na {{ background: url({}); }}\n</style>",
            data_uri("image/gif", b"GIF89a")
        )
    );
}

#[tokio::test]
async fn test_remote_stylesheet_urls_rebased_to_absolute() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("a { background: url(img/a.png); }"),
        )
        .mount(&mock_server)
        .await;

    let html = format!(
        r#"<link rel="stylesheet" href="{}/css/site.css">"#,
        mock_server.uri()
    );
    let output = inline_html(InlineRequest::new(html, CASES)).await;

    assert!(output.error.is_none());
    assert_eq!(
        output.text,
        format!(
            "<style>\na {{ background: url({}/css/img/a.png); }}\n</style>",
            mock_server.uri()
        )
    );
}

#[tokio::test]
async fn test_inline_remote_links_with_no_protocol() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lib.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("lib();"))
        .mount(&mock_server)
        .await;

    // http://127.0.0.1:port -> //127.0.0.1:port
    let host = mock_server.uri().trim_start_matches("http:").to_string();
    let html = format!(r#"<script src="{host}/lib.js"></script>"#);
    let base = format!("{}/pages/", mock_server.uri());
    let output = inline_html(InlineRequest::new(html, base).strict()).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, "<script>\nlib();\n</script>");
}

// ============================================================================
// Scripts
// ============================================================================

#[tokio::test]
async fn test_inline_scripts() {
    let html = read_case("script.html");
    let js = read_case("assets/app.js");
    let expected = html.replace(
        r#"<script src="assets/app.js"></script>"#,
        &format!("<script>\n{js}\n</script>"),
    );

    let output = inline_html(InlineRequest::new(html, CASES)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
    assert!(output.text.contains("<script>var inline = true;</script>"));
}

#[tokio::test]
async fn test_scripts_disabled() {
    let html = read_case("script.html");
    let output = inline_html(InlineRequest::new(html.clone(), CASES).scripts(false)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, html);
}

#[tokio::test]
async fn test_replacement_tokens_are_not_expanded() {
    let html = read_case("script-regex-escape.html");
    let js = read_case("assets/regex.js");

    let output = inline_html(InlineRequest::new(html.clone(), CASES)).await;

    assert!(output.error.is_none());
    assert!(output.text.contains("$&"));
    assert_eq!(
        output.text,
        html.replace(
            r#"<script type="text/javascript" src="assets/regex.js"></script>"#,
            &format!("<script type=\"text/javascript\">\n{js}\n</script>"),
        )
    );
}

#[tokio::test]
async fn test_self_closing_script_does_not_hide_later_references() {
    let js = read_case("assets/app.js");
    let html = concat!(
        r#"<script src="assets/app.js"/>"#,
        r#"<img src="assets/pixel.png">"#,
        r#"<script src="assets/app.js"></script>"#,
    );

    let output = inline_html(InlineRequest::new(html, CASES).images(true).strict()).await;

    assert!(output.error.is_none());
    assert_eq!(
        output.text,
        format!(
            "<script>\n{js}\n</script><img src=\"{}\"><script>\n{js}\n</script>",
            pixel_uri()
        )
    );
}

// ============================================================================
// Images
// ============================================================================

#[tokio::test]
async fn test_inline_local_images() {
    let html = read_case("img.html");
    let expected = html.replace("assets/pixel.png", &pixel_uri());

    let output = inline_html(InlineRequest::new(html, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
    assert!(output.text.contains(r#"alt="pixel""#));
}

#[tokio::test]
async fn test_images_off_by_default() {
    let html = read_case("img.html");
    let output = inline_html(InlineRequest::new(html.clone(), CASES)).await;
    assert_eq!(output.text, html);
}

#[tokio::test]
async fn test_inline_remote_images() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<svg/>", "image/svg+xml; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let html = format!(r#"<img src="{}/logo" width="10">"#, mock_server.uri());
    let output = inline_html(InlineRequest::new(html, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(
        output.text,
        format!(
            r#"<img src="{}" width="10">"#,
            data_uri("image/svg+xml", b"<svg/>")
        )
    );
}

#[tokio::test]
async fn test_inline_based_on_inline_attribute() {
    let html = read_case("img-opt-in.html");
    let expected = replace_nth(&html, "assets/pixel.png", 0, &pixel_uri());

    let output = inline_html(InlineRequest::new(html, CASES).images(false)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
}

#[tokio::test]
async fn test_exclude_based_on_inline_attribute() {
    let html = read_case("img-opt-out.html");
    let expected = replace_nth(&html, "assets/pixel.png", 1, &pixel_uri());

    let output = inline_html(InlineRequest::new(html, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
}

#[tokio::test]
async fn test_include_images_based_on_size() {
    let html = read_case("img-opt-out.html");
    let expected = replace_nth(&html, "assets/pixel.png", 1, &pixel_uri());

    let output = inline_html(InlineRequest::new(html, CASES).images(8.0)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
}

#[tokio::test]
async fn test_exclude_images_based_on_size() {
    let html = read_case("img-too-large.html");

    let output = inline_html(InlineRequest::new(html.clone(), CASES).images(0.1)).await;
    assert!(output.error.is_none());
    assert_eq!(output.text, html);

    let output = inline_html(InlineRequest::new(html.clone(), CASES).images(8.0)).await;
    assert!(output.error.is_none());
    assert!(output.text.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn test_declared_size_over_threshold_is_not_fetched() {
    let html = read_case("img-size-hint.html");

    // The file does not exist; a fetch would fail in strict mode
    let output = inline_html(InlineRequest::new(html.clone(), CASES).images(8.0).strict()).await;
    assert!(output.error.is_none());
    assert_eq!(output.text, html);

    let output = inline_html(InlineRequest::new(html.clone(), CASES).images(true).strict()).await;
    assert!(output.error.is_some());
    assert_eq!(output.text, html);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_http_errors_surface_when_strict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.js"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let html = format!(r#"<script src="{}/missing.js"></script>"#, mock_server.uri());
    let output = inline_html(InlineRequest::new(html.clone(), CASES).strict()).await;

    assert_eq!(output.text, html);
    let error = output.error.expect("strict mode reports failures");
    assert_eq!(error.len(), 1);
    let failure = &error.failures[0];
    assert_eq!(failure.kind, ReferenceKind::Script);
    assert_eq!(failure.error.kind(), ErrorKind::FetchFailed);
    assert!(matches!(
        failure.error,
        InlineError::HttpStatus { status: 404, .. }
    ));
    assert!(error.to_string().contains("404"));
}

#[tokio::test]
async fn test_http_errors_warn_when_not_strict() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.css"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CollectingSink::new());
    let inliner = Inliner::builder().warning_sink(sink.clone()).build();
    let html = format!(
        r#"<link rel="stylesheet" href="{}/missing.css">"#,
        mock_server.uri()
    );
    let output = inliner.html(&html, CASES).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, html);
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("failed with status 500"));
}

#[tokio::test]
async fn test_missing_file_errors_surface_when_strict() {
    let html = read_case("missing-file.html");
    let output = inline_html(InlineRequest::new(html, CASES).strict()).await;

    // Best-effort text: the missing link is untouched, the script is inlined
    assert!(output
        .text
        .contains(r#"<link rel="stylesheet" href="assets/missing.css">"#));
    assert!(output.text.contains("console.log('inlined');"));

    let error = output.error.expect("strict mode reports failures");
    assert_eq!(error.len(), 1);
    assert_eq!(error.failures[0].reference, "assets/missing.css");
    assert_eq!(error.failures[0].error.kind(), ErrorKind::FileNotFound);
}

#[tokio::test]
async fn test_missing_file_errors_warn_when_not_strict() {
    init_tracing();
    let sink = Arc::new(CollectingSink::new());
    let inliner = Inliner::builder()
        .scripts(false)
        .warning_sink(sink.clone())
        .build();
    let html = read_case("missing-file.html");
    let output = inliner.html(&html, CASES).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, html);
    assert_eq!(sink.messages().len(), 1);
    assert!(sink.messages()[0].starts_with("assets/missing.css"));
}

#[tokio::test]
async fn test_all_fetches_settle_before_substitution() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow();")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken.js"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fast.css"))
        .respond_with(ResponseTemplate::new(200).set_body_string("i { font-style: italic; }"))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let html = format!(
        concat!(
            r#"<script src="{0}/slow.js"></script>"#,
            r#"<script src="{0}/broken.js"></script>"#,
            r#"<link rel="stylesheet" href="{0}/fast.css">"#,
        ),
        uri
    );
    let output = inline_html(InlineRequest::new(html, CASES).strict()).await;

    assert_eq!(
        output.text,
        format!(
            "<script>\nslow();\n</script><script src=\"{uri}/broken.js\"></script><style>\ni {{ font-style: italic; }}\n</style>"
        )
    );
    let error = output.error.unwrap();
    assert_eq!(error.len(), 1);
    assert!(error.failures[0].reference.ends_with("/broken.js"));
}

// ============================================================================
// CSS documents
// ============================================================================

#[tokio::test]
async fn test_css_inline_local_urls() {
    let css = read_case("css.css");
    // Only the opt-in url() is inlined
    let expected = replace_nth(&css, "assets/pixel.png", 1, &pixel_uri());

    let output = inline_css(InlineRequest::new(css, CASES).images(false)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
    assert!(output.text.contains("url(#gradient)"));
}

#[tokio::test]
async fn test_css_opt_out_comment() {
    let css = read_case("css.css");
    let expected = replace_nth(&css, "assets/pixel.png", 0, &pixel_uri());
    let expected = replace_nth(&expected, "assets/pixel.png", 0, &pixel_uri());

    let output = inline_css(InlineRequest::new(css, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, expected);
    assert!(output.text.contains("url('assets/pixel.png') /* data-inline-ignore */"));
}

#[tokio::test]
async fn test_css_inline_remote_urls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fonts/icons.woff"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"wOFF".to_vec())
                .insert_header("content-type", "font/woff"),
        )
        .mount(&mock_server)
        .await;

    let css = format!(
        "@font-face {{ font-family: icons; src: url('{}/fonts/icons.woff'); }}",
        mock_server.uri()
    );
    let output = inline_css(InlineRequest::new(css, CASES).images(true)).await;

    assert!(output.error.is_none());
    assert_eq!(
        output.text,
        format!(
            "@font-face {{ font-family: icons; src: url('{}'); }}",
            data_uri("font/woff", b"wOFF")
        )
    );
}

// ============================================================================
// Document invariants and configuration
// ============================================================================

#[tokio::test]
async fn test_document_without_references_is_byte_identical() {
    let html = "<!DOCTYPE html>\r\n<html>\n<body>\t<p>caf\u{e9} &amp; <b>bold</b></p></body>\n</html>";
    let output = inline_html(InlineRequest::new(html, CASES).images(true).strict()).await;
    assert!(output.error.is_none());
    assert_eq!(output.text, html);
}

#[tokio::test]
async fn test_rerun_on_inlined_document_is_noop() {
    let html = read_case("css-images.html");
    let first = inline_html(InlineRequest::new(html, CASES).images(true).strict()).await;
    assert!(first.error.is_none());

    let second =
        inline_html(InlineRequest::new(first.text.clone(), CASES).images(true).strict()).await;
    assert!(second.error.is_none());
    assert_eq!(second.text, first.text);
}

#[tokio::test]
async fn test_custom_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.js"))
        .and(header("user-agent", "CustomBot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("custom();"))
        .mount(&mock_server)
        .await;

    let inliner = Inliner::builder()
        .user_agent("CustomBot/1.0")
        .strict(true)
        .build();
    let html = format!(r#"<script src="{}/app.js"></script>"#, mock_server.uri());
    let output = inliner.html(&html, CASES).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, "<script>\ncustom();\n</script>");
}

#[tokio::test]
async fn test_default_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.js"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("default();"))
        .mount(&mock_server)
        .await;

    let html = format!(r#"<script src="{}/app.js"></script>"#, mock_server.uri());
    let output = inline_html(InlineRequest::new(html, CASES).strict()).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, "<script>\ndefault();\n</script>");
}

#[tokio::test]
async fn test_custom_inline_attribute() {
    let html = r#"<img src="assets/pixel.png" inline><img src="assets/pixel.png" data-inline>"#;
    let inliner = Inliner::builder().inline_attribute("inline").build();
    let output = inliner.html(html, CASES).await;

    assert!(output.error.is_none());
    assert_eq!(output.text, replace_nth(html, "assets/pixel.png", 0, &pixel_uri()));
}
