//! Example: Inline the bundled test documents and display results
//!
//! Run with: cargo run -p inlinekit --example inline_cases
//!
//! This example runs the inliner over the fixture documents under
//! `tests/cases` with different image policies.

use inlinekit::{inline_css, inline_html, ImagePolicy, InlineOutput, InlineRequest};

const CASES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/cases/");

/// Example case definition
struct Case {
    file: &'static str,
    description: &'static str,
    images: ImagePolicy,
    expect_contains: Option<&'static str>,
}

const CASES_TO_RUN: &[Case] = &[
    Case {
        file: "css.html",
        description: "Local stylesheet link",
        images: ImagePolicy::Enabled(false),
        expect_contains: Some("<style>"),
    },
    Case {
        file: "css-images.html",
        description: "Stylesheet with nested url() references",
        images: ImagePolicy::Enabled(true),
        expect_contains: Some("data:image/png;base64,"),
    },
    Case {
        file: "script-regex-escape.html",
        description: "Script containing replacement tokens",
        images: ImagePolicy::Enabled(false),
        expect_contains: Some("$&"),
    },
    Case {
        file: "img-too-large.html",
        description: "Image over a 0.1 KB limit",
        images: ImagePolicy::MaxKb(0.1),
        expect_contains: Some("assets/large.png"),
    },
    Case {
        file: "css.css",
        description: "CSS document with comment markers",
        images: ImagePolicy::Enabled(false),
        expect_contains: Some("/* data-inline-ignore */"),
    },
];

#[tokio::main]
async fn main() {
    println!("InlineKit Examples");
    println!("==================\n");

    let mut passed = 0;
    let mut failed = 0;

    for (i, case) in CASES_TO_RUN.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   File: {}", case.file);

        let content = match std::fs::read_to_string(format!("{CASES}{}", case.file)) {
            Ok(content) => content,
            Err(e) => {
                println!("   Error: {}", e);
                println!("   ✗ FAIL\n");
                failed += 1;
                continue;
            }
        };

        let request = InlineRequest::new(content.clone(), CASES)
            .images(case.images)
            .strict();
        let output = if case.file.ends_with(".css") {
            inline_css(request).await
        } else {
            inline_html(request).await
        };

        print_output_summary(&content, &output);

        if output.error.is_none() && check_expectations(case, &output) {
            println!("   ✓ PASS\n");
            passed += 1;
        } else {
            println!("   ✗ FAIL\n");
            failed += 1;
        }
    }

    println!("==================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_output_summary(original: &str, output: &InlineOutput) {
    println!(
        "   Size: {} -> {} bytes",
        original.len(),
        output.text.len()
    );

    let preview = output.text.chars().take(100).collect::<String>();
    let preview = preview.replace('\n', " ");
    println!(
        "   Preview: {}{}",
        preview,
        if output.text.len() > 100 { "..." } else { "" }
    );

    if let Some(ref error) = output.error {
        println!("   Error: {}", error);
    }
}

fn check_expectations(case: &Case, output: &InlineOutput) -> bool {
    if let Some(expected_text) = case.expect_contains {
        if !output.text.contains(expected_text) {
            println!("   Expected output to contain '{}'", expected_text);
            return false;
        }
    }

    true
}
