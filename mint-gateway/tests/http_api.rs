//! End-to-end tests: real gateways on ephemeral ports talking HTTP to each
//! other.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

use ledger::{HttpMintClient, LedgerStore, MintContext, Scheduler, SchedulerConfig};
use mint_gateway::{app, state::AppState};

struct TestMint {
    host: String,
    ctx: MintContext,
}

impl TestMint {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let host = listener.local_addr().expect("local addr").to_string();
        let client = HttpMintClient::with_timeout("http", 2406, Duration::from_secs(5))
            .expect("peer client");
        let ctx = MintContext::new(host.clone(), Arc::new(LedgerStore::in_memory()), Arc::new(client));
        let router = app(AppState::new(ctx.clone()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        Self { host, ctx }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.host, path.trim_start_matches('/'))
    }

    fn user(&self, name: &str) -> String {
        format!("{name}@{}", self.host)
    }

    fn usd(&self, name: &str) -> String {
        format!("{}[USD.2]", self.user(name))
    }

    async fn post_as(&self, user: &str, path: &str, form: &[(&str, String)]) -> (StatusCode, Value) {
        let resp = Client::new()
            .post(self.url(path))
            .header("X-Mint-User", user)
            .form(form)
            .send()
            .await
            .expect("request");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = Client::new().get(self.url(path)).send().await.expect("request");
        let status = resp.status();
        (status, resp.json().await.expect("json body"))
    }

    async fn issue_usd(&self, user: &str) {
        let (status, body) = self
            .post_as(user, "/assets", &[("code", "USD".into()), ("scale", "2".into())])
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    /// Offer by `user` giving its USD for `quote`.
    async fn offer(&self, user: &str, quote: &str, price: &str, amount: &str) -> String {
        let (status, body) = self
            .post_as(
                user,
                "/offers",
                &[
                    ("pair", format!("{}/{quote}", self.usd(user))),
                    ("price", price.to_string()),
                    ("amount", amount.to_string()),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["offer"]["id"].as_str().expect("offer id").to_string()
    }
}

#[tokio::test]
async fn health_reports_host() {
    let mint = TestMint::spawn().await;
    let (status, body) = mint.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["host"], mint.host.as_str());
}

#[tokio::test]
async fn assets_and_offers_round_trip_over_http() {
    let mint = TestMint::spawn().await;
    mint.issue_usd("kurt").await;

    let (status, body) = mint
        .post_as("kurt", "/assets", &[("code", "USD".into()), ("scale", "2".into())])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["err_code"], "asset_already_exists");

    let (status, body) = mint.get(&format!("/assets/{}", mint.usd("kurt"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asset"]["code"], "USD");

    let id = mint
        .offer("kurt", &mint.usd("alan"), "100/98", "100")
        .await;
    let (status, body) = mint.get(&format!("/offers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offer"]["price"], "100/98");
    assert_eq!(body["offer"]["remainder"], "100");
    assert_eq!(
        body["offer"]["pair"],
        format!("{}/{}", mint.usd("kurt"), mint.usd("alan")).as_str()
    );

    // Only the owner may close it.
    let (status, _) = mint.post_as("alan", &format!("/offers/{id}/close"), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = mint.post_as("kurt", &format!("/offers/{id}/close"), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offer"]["status"], "closed");
}

#[tokio::test]
async fn requests_without_user_are_unauthorized() {
    let mint = TestMint::spawn().await;
    let resp = Client::new()
        .post(mint.url("/assets"))
        .form(&[("code", "USD"), ("scale", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["err_code"], "unauthorized");
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let mint = TestMint::spawn().await;
    let missing = format!("{}:offer_missing", mint.user("kurt"));
    let (status, body) = mint.get(&format!("/offers/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["err_code"], "offer_not_found");

    let missing = format!("{}:transaction_missing", mint.user("kurt"));
    let (status, body) = mint.get(&format!("/transactions/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["err_code"], "transaction_not_found");
}

#[tokio::test]
async fn transaction_crosses_offers_on_two_mints() {
    let m0 = TestMint::spawn().await;
    let m1 = TestMint::spawn().await;
    m0.issue_usd("kurt").await;
    m1.issue_usd("alan").await;
    let kurt_offer = m0.offer("kurt", &m1.usd("alan"), "100/100", "100").await;
    let alan_offer = m1.offer("alan", &m0.usd("kurt"), "100/100", "100").await;

    let (status, body) = m0
        .post_as(
            "kurt",
            "/transactions",
            &[
                ("pair", format!("{}/{}", m0.usd("kurt"), m0.usd("kurt"))),
                ("amount", "10".into()),
                ("destination", m1.user("john")),
                ("path[]", alan_offer.clone()),
                ("path[]", kurt_offer.clone()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["transaction"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["transaction"]["status"], "reserved");

    for (mint, offer) in [(&m0, &kurt_offer), (&m1, &alan_offer)] {
        let (status, body) = mint.get(&format!("/offers/{offer}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["offer"]["remainder"], "90");

        let (status, body) = mint.get(&format!("/transactions/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["id"], id.as_str());
    }

    let (_, on_m1) = m1.get(&format!("/transactions/{id}")).await;
    assert_eq!(on_m1["transaction"]["operations"][0]["amount"], "10");
    assert_eq!(on_m1["transaction"]["operations"][0]["transaction_hop"], 2);
    assert_eq!(on_m1["transaction"]["crossings"][0]["transaction_hop"], 1);

    // Reposting the hop m0 forwarded is answered 200 and crosses nothing.
    let resp = Client::new()
        .post(m1.url(&format!("/transactions/{id}")))
        .form(&[("hop", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let (_, body) = m1.get(&format!("/offers/{alan_offer}")).await;
    assert_eq!(body["offer"]["remainder"], "90");

    let resp = Client::new()
        .post(m1.url(&format!("/transactions/{id}")))
        .form(&[("hop", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn insufficient_remainder_is_payment_required() {
    let m0 = TestMint::spawn().await;
    let m1 = TestMint::spawn().await;
    m1.issue_usd("alan").await;
    let alan_offer = m1.offer("alan", &m0.usd("kurt"), "100/98", "10").await;

    let (status, body) = m0
        .post_as(
            "kurt",
            "/transactions",
            &[
                ("pair", format!("{}/{}", m0.usd("kurt"), m1.usd("alan"))),
                ("amount", "10".into()),
                ("destination", m1.user("john")),
                ("path[]", alan_offer.clone()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["err_code"], "transaction_failed");

    let (_, body) = m1.get(&format!("/offers/{alan_offer}")).await;
    assert_eq!(body["offer"]["remainder"], "10");
}

#[tokio::test]
async fn propagation_reaches_peers_over_http() {
    let m0 = TestMint::spawn().await;
    let m1 = TestMint::spawn().await;
    m1.issue_usd("alan").await;
    let alan_offer = m1.offer("alan", &m0.usd("kurt"), "1/1", "100").await;

    let (status, body) = m0
        .post_as(
            "kurt",
            "/transactions",
            &[
                ("pair", format!("{}/{}", m0.usd("kurt"), m1.usd("alan"))),
                ("amount", "10".into()),
                ("destination", m1.user("john")),
                ("path[]", alan_offer.clone()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let first_leg = body["transaction"]["operations"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..2 {
        for mint in [&m0, &m1] {
            Scheduler::new(mint.ctx.clone(), SchedulerConfig::default())
                .tick()
                .await
                .expect("tick");
        }
    }

    let (status, body) = m0.get(&format!("/offers/{alan_offer}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offer"]["propagation"], "propagated");
    assert_eq!(body["offer"]["remainder"], "90");

    let (status, body) = m1.get(&format!("/operations/{first_leg}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"]["propagation"], "propagated");

    // A repeated notice is acknowledged without creating anything.
    let resp = Client::new()
        .post(m1.url(&format!("/operations/{first_leg}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
