use confluence_space_export::contract::{MockConfluenceApi, PageId};
use confluence_space_export::tree::discover;

fn page(id: &str) -> PageId {
    PageId::from(id)
}

/// Children returned for a given parent id, empty for everything else.
fn expect_children(api: &mut MockConfluenceApi, parent: &str, children: Vec<(&str, &str)>) {
    let parent = parent.to_owned();
    let children: Vec<(PageId, String)> = children
        .into_iter()
        .map(|(id, title)| (page(id), title.to_owned()))
        .collect();
    api.expect_list_children()
        .withf(move |id| id.as_str() == parent)
        .returning(move |_| Ok(children.clone()));
}

#[tokio::test]
async fn discovers_all_descendants_excluding_the_homepage() {
    let mut api = MockConfluenceApi::new();
    expect_children(&mut api, "1", vec![("2", "Alpha"), ("3", "Beta")]);
    expect_children(&mut api, "2", vec![]);
    expect_children(&mut api, "3", vec![("4", "Gamma")]);
    expect_children(&mut api, "4", vec![]);

    let pages = discover(&api, &page("1")).await.expect("discovery succeeds");

    let ids: Vec<&str> = pages.keys().map(PageId::as_str).collect();
    assert_eq!(ids, vec!["2", "3", "4"]);
    assert!(!pages.contains_key(&page("1")), "homepage must not be its own child");
    assert_eq!(pages[&page("2")], "Alpha");
    assert_eq!(pages[&page("3")], "Beta");
    assert_eq!(pages[&page("4")], "Gamma");
}

#[tokio::test]
async fn leaf_homepage_yields_empty_tree() {
    let mut api = MockConfluenceApi::new();
    expect_children(&mut api, "1", vec![]);

    let pages = discover(&api, &page("1")).await.expect("discovery succeeds");
    assert!(pages.is_empty());
}

#[tokio::test]
async fn repeated_page_id_is_merged_and_visited_once() {
    // "5" is reachable through both children; it must appear once and its
    // own children must only be fetched once.
    let mut api = MockConfluenceApi::new();
    expect_children(&mut api, "1", vec![("2", "Left"), ("3", "Right")]);
    expect_children(&mut api, "2", vec![("5", "Shared")]);
    expect_children(&mut api, "3", vec![("5", "Shared")]);
    api.expect_list_children()
        .withf(|id| id.as_str() == "5")
        .times(1)
        .returning(|_| Ok(vec![]));

    let pages = discover(&api, &page("1")).await.expect("discovery succeeds");

    let ids: Vec<&str> = pages.keys().map(PageId::as_str).collect();
    assert_eq!(ids, vec!["2", "3", "5"]);
}

#[tokio::test]
async fn traversal_error_propagates() {
    let mut api = MockConfluenceApi::new();
    expect_children(&mut api, "1", vec![("2", "Alpha")]);
    api.expect_list_children()
        .withf(|id| id.as_str() == "2")
        .returning(|_| {
            Err(confluence_space_export::error::ApiError::Remote {
                status: 500,
                body: "boom".to_owned(),
            })
        });

    let result = discover(&api, &page("1")).await;
    assert!(result.is_err(), "remote failure during traversal is fatal");
}
