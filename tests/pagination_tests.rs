use inkpress::pagination::{Page, clamp_page, offset};

#[test]
fn test_pages_is_ceiling_of_total_over_per_page() {
    assert_eq!(Page::new(vec![0; 9], 1, 9, 12).pages, 2);
    assert_eq!(Page::new(vec![0; 9], 1, 9, 27).pages, 3);
    assert_eq!(Page::new(vec![0; 1], 1, 9, 1).pages, 1);
    // An empty result set spans zero pages.
    assert_eq!(Page::<i64>::new(vec![], 1, 9, 0).pages, 0);
}

#[test]
fn test_paginate_cuts_the_requested_window() {
    let all: Vec<i64> = (1..=12).collect();

    let first = Page::paginate(all.clone(), 1, 9);
    assert_eq!(first.items, (1..=9).collect::<Vec<i64>>());
    assert_eq!(first.page, 1);
    assert_eq!(first.per_page, 9);
    assert_eq!(first.total, 12);
    assert_eq!(first.pages, 2);

    let second = Page::paginate(all, 2, 9);
    assert_eq!(second.items, vec![10, 11, 12]);
    assert_eq!(second.page, 2);
}

#[test]
fn test_paginate_past_the_end_is_empty_with_metadata_intact() {
    let page = Page::paginate((1..=12).collect::<Vec<i64>>(), 5, 9);
    assert!(page.items.is_empty());
    assert_eq!(page.page, 5);
    assert_eq!(page.total, 12);
    assert_eq!(page.pages, 2);
}

#[test]
fn test_paginate_clamps_nonsense_arguments() {
    let page = Page::paginate(vec![1, 2, 3], 0, 2);
    assert_eq!(page.page, 1);
    assert_eq!(page.items, vec![1, 2]);

    let page = Page::paginate(vec![1, 2, 3], -4, 0);
    assert_eq!(page.page, 1);
    assert_eq!(page.per_page, 1);
    assert_eq!(page.items, vec![1]);
}

#[test]
fn test_map_keeps_metadata() {
    let page = Page::paginate((1..=12).collect::<Vec<i64>>(), 2, 9);
    let mapped = page.map(|n| format!("#{n}"));

    assert_eq!(mapped.items, vec!["#10", "#11", "#12"]);
    assert_eq!(mapped.page, 2);
    assert_eq!(mapped.per_page, 9);
    assert_eq!(mapped.total, 12);
    assert_eq!(mapped.pages, 2);
}

#[test]
fn test_clamp_page_defaults_and_floors() {
    assert_eq!(clamp_page(None), 1);
    assert_eq!(clamp_page(Some(0)), 1);
    assert_eq!(clamp_page(Some(-3)), 1);
    assert_eq!(clamp_page(Some(4)), 4);
}

#[test]
fn test_offset_matches_page_windows() {
    assert_eq!(offset(1, 9), 0);
    assert_eq!(offset(2, 9), 9);
    assert_eq!(offset(3, 10), 20);
    assert_eq!(offset(0, 9), 0);
}
