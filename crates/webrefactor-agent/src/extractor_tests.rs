use super::*;

const NEWS: &str = include_str!("../tests/fixtures/news.html");

fn news() -> PageDocument {
    PageDocument::parse(NEWS, "https://news.example.com/")
}

fn first<'a>(doc: &'a PageDocument, selector: &str) -> ElementRef<'a> {
    doc.element(doc.first_match(selector).unwrap().unwrap()).unwrap()
}

#[test]
fn test_structure_counts() {
    let summary = extract_summary(&news());
    assert_eq!(summary.title, "Example News");
    assert_eq!(
        summary.structure,
        ContentStructure {
            headings: 6,
            paragraphs: 10,
            lists: 1,
            links: 8,
            images: 0,
            videos: 0,
            forms: 1,
            inputs: 2,
        }
    );
}

#[test]
fn test_advertisements_skip_primary_content() {
    let summary = extract_summary(&news());
    let ads: Vec<(&str, &str)> = summary
        .advertisements
        .iter()
        .map(|a| (a.selector.as_str(), a.reason.as_str()))
        .collect();
    assert_eq!(
        ads,
        vec![
            ("div.ad-banner.ad-banner-top", "Matched ad selector: .ad-banner"),
            ("div.sidebar-ad", "Matched ad selector: .sidebar-ad"),
            ("aside.sidebar", "Contains specific ad keywords"),
        ]
    );
    assert_eq!(summary.advertisements[0].text, "Buy one get one free, today only");
    assert_eq!(summary.advertisements[2].tag_name, "aside");
}

#[test]
fn test_hidden_keyword_regions_are_ignored() {
    let doc = PageDocument::parse(
        r#"<body><div style="display:none"><aside>Sponsored by Acme</aside></div>
           <div class="widget">Ads by Google</div></body>"#,
        "https://a.test/",
    );
    let summary = extract_summary(&doc);
    assert_eq!(summary.advertisements.len(), 1);
    assert_eq!(summary.advertisements[0].selector, "div.widget");
}

#[test]
fn test_ads_are_capped() {
    let markup = format!("<body>{}</body>", "<div class=\"ads\">x</div>".repeat(30));
    let summary = extract_summary(&PageDocument::parse(&markup, "https://a.test/"));
    assert_eq!(summary.advertisements.len(), PageSummary::MAX_ADS);
}

#[test]
fn test_layout_hint() {
    let summary = extract_summary(&news());
    assert_eq!(
        summary.layout,
        Some(LayoutHint {
            has_header: true,
            has_nav: true,
            has_main: true,
            has_sidebar: true,
            has_footer: true,
            main_selector: Some("main".to_string()),
        })
    );
}

#[test]
fn test_interactive_elements() {
    let summary = extract_summary(&news());
    assert_eq!(summary.interactive_total, 12);
    assert_eq!(summary.interactive_elements.len(), 12);

    let find = |selector: &str| {
        summary
            .interactive_elements
            .iter()
            .find(|e| e.selector == selector)
            .unwrap_or_else(|| panic!("no interactive element {selector}"))
    };

    let ad_link = find("body > div > div:nth-of-type(1) > a");
    assert_eq!(ad_link.purpose, "commerce");
    assert!(ad_link.can_be_removed);

    let home = find("body > div > header > nav > a:nth-of-type(1)");
    assert_eq!(home.text, "Home");
    assert!(!home.can_be_removed);

    let search = find("form.search");
    assert_eq!(search.purpose, "search");

    let input = find("body > div > header > form > input");
    assert_eq!(input.input_type.as_deref(), Some("search"));
    assert_eq!(input.text, "Search");

    let comment = find("#comment-box");
    assert!(!comment.can_be_removed);
}

#[test]
fn test_unique_selector_falls_back_to_path() {
    let doc = news();
    let article = first(&doc, "article.story");
    let selector = unique_selector(&doc, article).unwrap();
    assert_eq!(selector, "body > div > div:nth-of-type(2) > main > article:nth-of-type(1)");
    assert_eq!(doc.select_ids(&selector).unwrap(), vec![article.id()]);

    assert_eq!(unique_selector(&doc, first(&doc, "main")).unwrap(), "#content");
}

#[test]
fn test_simple_selector_and_escaping() {
    let doc = PageDocument::parse(
        r#"<body><div id="1st">a</div><span class="a.b c d e">b</span></body>"#,
        "https://a.test/",
    );
    let div = doc.body().unwrap().children().find_map(ElementRef::wrap).unwrap();
    assert_eq!(simple_selector(div), r"#\31 st");
    assert_eq!(
        simple_selector(first(&doc, "span")),
        r"span.a\.b.c.d"
    );
    assert_eq!(doc.select_ids(r"#\31 st").unwrap().len(), 1);
}

#[test]
fn test_text_blocks() {
    let summary = extract_summary(&news());
    assert_eq!(summary.text_blocks.len(), PageSummary::MAX_TEXT_BLOCKS);
    assert_eq!(summary.text_blocks[0], "Buy one get one free, today only");
    assert!(summary.text_blocks.iter().all(|b| b.chars().count() <= 200));
    assert!(!summary.text_blocks.iter().any(|b| b.contains("analytics")));
}

#[test]
fn test_purpose_guess() {
    let doc = PageDocument::parse(
        r#"<body><button id="a">Sign in</button><button id="b">Share this</button>
           <a id="c" class="ad top" href="/x">Deal</a><a id="d" href="/y">Read more</a></body>"#,
        "https://a.test/",
    );
    assert_eq!(guess_purpose(first(&doc, "#a")), "login");
    assert_eq!(guess_purpose(first(&doc, "#b")), "social");
    assert_eq!(guess_purpose(first(&doc, "#c")), "advertisement");
    assert_eq!(guess_purpose(first(&doc, "#d")), "unknown");
}
