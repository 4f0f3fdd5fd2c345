//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small catalog over HTTP and drive
//! the full run cycle end-to-end through the real fetcher.

use catalog_harvester::config::{Config, RunConfig, SourceConfig};
use catalog_harvester::crawler::Coordinator;
use catalog_harvester::state::RunState;
use catalog_harvester::storage::{read_records, CheckpointError};
use catalog_harvester::HarvestError;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path, checkpoint_every: usize) -> Config {
    Config {
        run: RunConfig {
            output_path: output.to_path_buf(),
            delay_seconds: 0.0, // No pacing in tests
            retries: 2,
            verbose: false,
            limit: None,
            checkpoint_every,
            resume: false,
        },
        source: SourceConfig {
            base_url: format!("{}/", base_url),
            user_agent: "TestHarvester/1.0".to_string(),
            timeout_seconds: 5,
        },
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

fn home_page(slugs: &[&str]) -> String {
    let entries: String = slugs
        .iter()
        .map(|slug| {
            format!(r#"<li><a href="catalogue/category/books/{slug}/index.html">{slug}</a></li>"#)
        })
        .collect();
    format!(
        r#"<html><body><div class="side_categories"><ul>
        <li><a href="catalogue/category/books_1/index.html">Books</a><ul>{entries}</ul></li>
        </ul></div></body></html>"#
    )
}

fn listing_page(books: &[String], next: Option<&str>) -> String {
    let articles: String = books
        .iter()
        .map(|book| {
            format!(
                r#"<li><article class="product_pod"><h3><a href="../../../{book}/index.html">{book}</a></h3></article></li>"#
            )
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{href}">next</a></li></ul>"#))
        .unwrap_or_default();
    format!(r#"<html><body><ol class="row">{articles}</ol>{pager}</body></html>"#)
}

fn book_page(title: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <div id="product_gallery"><div class="item active"><img src="../../media/cache/{title}.jpg" alt="{title}" /></div></div>
        <div class="col-sm-6 product_main">
          <h1>{title}</h1>
          <p class="price_color">{price}</p>
          <p class="instock availability"><i class="icon-ok"></i>
            In stock (22 available)
          </p>
          <p class="star-rating Four"><i class="icon-star"></i></p>
        </div>
        </body></html>"#
    )
}

/// Mounts a catalog of single-page categories; every book page must be
/// fetched exactly `book_fetches` times over the life of the server
async fn mount_catalog(server: &MockServer, categories: &[(&str, usize)], book_fetches: u64) {
    let slugs: Vec<&str> = categories.iter().map(|(slug, _)| *slug).collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(home_page(&slugs)))
        .mount(server)
        .await;

    for (slug, count) in categories {
        let books: Vec<String> = (0..*count).map(|i| format!("{slug}-book-{i}")).collect();
        Mock::given(method("GET"))
            .and(path(format!("/catalogue/category/books/{slug}/index.html")))
            .respond_with(html(listing_page(&books, None)))
            .mount(server)
            .await;

        for (i, book) in books.iter().enumerate() {
            Mock::given(method("GET"))
                .and(path(format!("/catalogue/{book}/index.html")))
                .respond_with(html(book_page(book, &format!("£{}.99", 10 + i))))
                .expect(book_fetches)
                .mount(server)
                .await;
        }
    }
}

#[tokio::test]
async fn test_full_harvest_two_categories() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_catalog(&mock_server, &[("travel_2", 3), ("mystery_3", 3)], 1).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("data").join("books.csv");
    let config = create_test_config(&base_url, &output, 2);

    let mut coordinator = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(coordinator.state(), RunState::Completed);
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.collected, 6);
    assert_eq!(summary.checkpoints, 2);
    assert_eq!(summary.final_flush_rows, 2);
    assert_eq!(coordinator.source().requests_sent(), 9);

    let records = read_records(&output).expect("Failed to read dataset");
    assert_eq!(records.len(), 6);

    let first = &records[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.title, "travel_2-book-0");
    assert_eq!(first.price.to_string(), "10.99");
    assert_eq!(first.rating, 4);
    assert_eq!(first.availability, 22);
    assert_eq!(first.category, "travel_2");
    assert_eq!(
        first.image_url,
        format!("{}/media/cache/travel_2-book-0.jpg", base_url)
    );
    assert_eq!(
        first.detail_url,
        format!("{}/catalogue/travel_2-book-0/index.html", base_url)
    );

    assert_eq!(records[3].id, 4);
    assert_eq!(records[3].category, "mystery_3");

    let header = std::fs::read_to_string(&output).expect("Failed to read CSV");
    assert!(header.starts_with("id,title,price,rating,availability,category,image_url,detail_url\n"));
}

#[tokio::test]
async fn test_resume_never_refetches() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    // Every book page is expected exactly once across both runs
    mount_catalog(&mock_server, &[("poetry_23", 3), ("history_32", 2)], 1).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("books.csv");

    let mut config = create_test_config(&base_url, &output, 2);
    config.run.limit = Some(3);
    let mut first = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = first.run().await.expect("First run failed");
    assert_eq!(summary.collected, 3);
    assert!(summary.limit_reached);

    config.run.limit = None;
    config.run.resume = true;
    let mut second = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = second.run().await.expect("Resumed run failed");

    assert_eq!(summary.skipped_existing, 3);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.total_rows, 5);

    let records = read_records(&output).expect("Failed to read dataset");
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(records[3].category, "history_32");
}

#[tokio::test]
async fn test_pagination_and_loop_guard() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(home_page(&["fantasy_19"])))
        .mount(&mock_server)
        .await;

    let page_one = vec!["fantasy-a".to_string(), "fantasy-b".to_string()];
    let page_two = vec!["fantasy-c".to_string()];
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/fantasy_19/index.html"))
        .respond_with(html(listing_page(&page_one, Some("page-2.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    // Page two points back at page one
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/fantasy_19/page-2.html"))
        .respond_with(html(listing_page(&page_two, Some("index.html"))))
        .expect(1)
        .mount(&mock_server)
        .await;
    for book in page_one.iter().chain(page_two.iter()) {
        Mock::given(method("GET"))
            .and(path(format!("/catalogue/{book}/index.html")))
            .respond_with(html(book_page(book, "£5.00")))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("books.csv");
    let config = create_test_config(&base_url, &output, 100);

    let mut coordinator = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(coordinator.state(), RunState::Completed);
    assert_eq!(summary.collected, 3);
    assert_eq!(summary.listing_pages, 2);
    assert_eq!(summary.categories_cut_short, 1);

    let titles: Vec<String> = read_records(&output)
        .expect("Failed to read dataset")
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["fantasy-a", "fantasy-b", "fantasy-c"]);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(home_page(&["music_14"])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/music_14/index.html"))
        .respond_with(html(listing_page(&["flaky-book".to_string()], None)))
        .mount(&mock_server)
        .await;

    // First attempt fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/catalogue/flaky-book/index.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/flaky-book/index.html"))
        .respond_with(html(book_page("flaky-book", "£12.50")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("books.csv");
    let config = create_test_config(&base_url, &output, 10);

    let mut coordinator = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(summary.collected, 1);
    assert_eq!(summary.failed, 0);
    let records = read_records(&output).expect("Failed to read dataset");
    assert_eq!(records[0].price.to_string(), "12.50");
}

#[tokio::test]
async fn test_broken_book_is_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(home_page(&["science_22"])))
        .mount(&mock_server)
        .await;
    let books = vec![
        "good-book".to_string(),
        "missing-book".to_string(),
        "last-book".to_string(),
    ];
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/science_22/index.html"))
        .respond_with(html(listing_page(&books, None)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/good-book/index.html"))
        .respond_with(html(book_page("good-book", "£1.00")))
        .mount(&mock_server)
        .await;
    // 1 attempt + 2 retries, then the item is given up on
    Mock::given(method("GET"))
        .and(path("/catalogue/missing-book/index.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/last-book/index.html"))
        .respond_with(html(book_page("last-book", "£3.00")))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("books.csv");
    let config = create_test_config(&base_url, &output, 10);

    let mut coordinator = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(coordinator.state(), RunState::Completed);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.failed, 1);

    let records = read_records(&output).expect("Failed to read dataset");
    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["good-book", "last-book"]);
    assert_eq!(records[1].id, 2);
}

#[tokio::test]
async fn test_incompatible_dataset_is_rejected() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_catalog(&mock_server, &[("travel_2", 1)], 0).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = dir.path().join("books.csv");
    std::fs::write(&output, "id,name,price\n1,Something,3.00\n").expect("Failed to seed CSV");

    let mut config = create_test_config(&base_url, &output, 10);
    config.run.resume = true;

    let mut coordinator = Coordinator::from_config(&config).expect("Failed to create coordinator");
    let err = coordinator.run().await.expect_err("Run should fail");

    assert!(matches!(
        err,
        HarvestError::Checkpoint(CheckpointError::SchemaMismatch { .. })
    ));
    assert_eq!(coordinator.state(), RunState::Aborted);

    let requests = mock_server
        .received_requests()
        .await
        .expect("Request recording is enabled");
    assert!(requests.is_empty());

    let untouched = std::fs::read_to_string(&output).expect("Failed to read CSV");
    assert_eq!(untouched, "id,name,price\n1,Something,3.00\n");
}
