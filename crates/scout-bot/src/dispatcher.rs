use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scout_core::{classify_text, WalletIdentifier};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregator::Aggregator;
use crate::error::AppError;
use crate::format;
use crate::telegram::{OutgoingMessage, TelegramClient, Update};

/// What a chat message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    CheckPrompt,
    Check(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed == format::CHECK_BUTTON {
            return Command::CheckPrompt;
        }

        // "/start@my_bot" addresses the command at a specific bot in groups
        let name = match trimmed.split_once('@') {
            Some((name, bot)) if !bot.is_empty() && !bot.contains(char::is_whitespace) => name,
            _ => trimmed,
        };
        match name {
            "/start" | "/help" => Command::Help,
            _ => Command::Check(trimmed.to_string()),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Dispatcher {
    aggregator: Aggregator,
    outbox: mpsc::Sender<OutgoingMessage>,
}

impl Dispatcher {
    pub fn new(aggregator: Aggregator, outbox: mpsc::Sender<OutgoingMessage>) -> Self {
        Self { aggregator, outbox }
    }

    /// Answer one text message. Every path ends with at least one reply.
    pub async fn handle_text(&self, chat_id: i64, text: &str) {
        match Command::parse(text) {
            Command::Help => {
                self.reply(OutgoingMessage::new(chat_id, format::usage_message()).with_keyboard())
                    .await
            }
            Command::CheckPrompt => {
                self.reply(OutgoingMessage::new(chat_id, format::check_prompt())).await
            }
            Command::Check(input) => self.check(chat_id, &input).await,
        }
    }

    async fn check(&self, chat_id: i64, input: &str) {
        self.reply(OutgoingMessage::new(chat_id, format::checking_notice())).await;

        let wallets = classify_text(input);
        tracing::info!(chat_id = %chat_id, wallets = wallets.len(), "Classified message");

        match wallets.as_slice() {
            [] => {
                self.reply(OutgoingMessage::new(chat_id, format::invalid_input())).await;
            }
            [wallet] => self.check_single(chat_id, wallet).await,
            _ => self.check_many(chat_id, &wallets).await,
        }
    }

    async fn check_single(&self, chat_id: i64, wallet: &WalletIdentifier) {
        let text = match self.aggregator.build_report(wallet.address()).await {
            Ok(report) => format::single_report(&report, wallet),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Single wallet check failed");
                format::check_failed(&e)
            }
        };
        self.reply(OutgoingMessage::new(chat_id, text)).await;
    }

    async fn check_many(&self, chat_id: i64, wallets: &[WalletIdentifier]) {
        self.reply(OutgoingMessage::new(
            chat_id,
            format::found_wallets_notice(wallets.len()),
        ))
        .await;

        let start = Instant::now();
        let outcome = self.aggregator.check_batch(wallets).await;
        tracing::info!(
            chat_id = %chat_id,
            checked = outcome.entries.len(),
            skipped = outcome.skipped(),
            duration_ms = %start.elapsed().as_millis(),
            "Batch check finished"
        );

        self.reply(OutgoingMessage::new(chat_id, format::batch_summary(&outcome)))
            .await;
    }

    /// Queue a reply, split into as many messages as Telegram needs.
    async fn reply(&self, message: OutgoingMessage) {
        let parts = format::split_message(&message.text, format::MAX_MESSAGE_LEN);
        for text in parts {
            let part = OutgoingMessage { text, ..message.clone() };
            if self.outbox.send(part).await.is_err() {
                tracing::warn!(chat_id = %message.chat_id, "Outbox closed, dropping reply");
                return;
            }
        }
    }
}

// ============================================================================
// Polling and delivery loops
// ============================================================================

/// Long-poll Telegram until cancelled, handing each text message to its own task.
pub async fn run_polling(
    client: TelegramClient,
    dispatcher: Arc<Dispatcher>,
    retry: Duration,
    cancel: CancellationToken,
) {
    let mut offset: i64 = 0;
    println!("[TELEGRAM] Polling for updates");

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.get_updates(offset) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    spawn_update(update, dispatcher.clone());
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    error_code = e.code(),
                    retry_secs = retry.as_secs(),
                    "Polling failed"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(retry) => {}
                }
            }
        }
    }

    println!("[TELEGRAM] Polling stopped");
}

fn spawn_update(update: Update, dispatcher: Arc<Dispatcher>) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text else {
        tracing::debug!(update_id = %update.update_id, "Ignoring non-text message");
        return;
    };
    let chat_id = message.chat.id;
    let outbox = dispatcher.outbox.clone();

    spawn_guarded(chat_id, outbox, async move {
        dispatcher.handle_text(chat_id, &text).await
    });
}

/// Run `work` on its own task and answer the chat if it panics.
fn spawn_guarded<F>(
    chat_id: i64,
    outbox: mpsc::Sender<OutgoingMessage>,
    work: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::spawn(work).await {
            tracing::error!(chat_id = %chat_id, error = %e, "Message handler crashed");
            let reply = OutgoingMessage::new(chat_id, format::unexpected_error());
            if outbox.send(reply).await.is_err() {
                tracing::warn!(chat_id = %chat_id, "Outbox closed, dropping reply");
            }
        }
    })
}

/// Drain the outbox into Telegram. Delivery failures are logged and dropped.
pub async fn run_sender(
    client: TelegramClient,
    mut outbox: mpsc::Receiver<OutgoingMessage>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = outbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        deliver(&client, &message).await;
    }
}

/// Send one message, falling back to plain text when Telegram rejects the markup.
async fn deliver(client: &TelegramClient, message: &OutgoingMessage) {
    let result = match client.send_message(message).await {
        Err(AppError::MarkdownRejected(reason)) if message.markdown => {
            tracing::warn!(
                chat_id = %message.chat_id,
                reason = %reason,
                "Markdown rejected, resending as plain text"
            );
            client.send_message(&message.clone().plain()).await
        }
        other => other,
    };

    if let Err(e) = result {
        tracing::error!(
            chat_id = %message.chat_id,
            error = %e,
            error_code = e.code(),
            "Failed to send message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarketplaceConfig, ReportConfig, TelegramConfig};
    use crate::gateway::MarketplaceGateway;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET_A: &str = "9sBtLtMHWT1Srg1Q2wQMifuY6jrt14fPv7CTpyB6aHQE";
    const WALLET_B: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    async fn marketplace() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/wallets/[^/]+/escrow_balance$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": 1.25})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/wallets/[^/]+/activities$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "buyNow", "price": 3, "tokenMint": "A"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/wallets/[^/]+/(tokens|offers_made|offers_received)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        server
    }

    fn aggregator(server: &MockServer) -> Aggregator {
        let gateway = MarketplaceGateway::new(&MarketplaceConfig {
            api_key: "key".to_string(),
            base_url: server.uri(),
            request_timeout_secs: 5,
            activity_page_size: 20,
        })
        .unwrap();
        Aggregator::new(
            gateway,
            &ReportConfig {
                recent_activity_limit: 5,
                max_batch: 5,
                batch_delay_ms: 0,
                report_timeout_ms: 5_000,
            },
        )
    }

    async fn replies(server: &MockServer, text: &str) -> Vec<OutgoingMessage> {
        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(aggregator(server), tx);
        dispatcher.handle_text(7, text).await;
        drop(dispatcher);

        let mut out = Vec::new();
        while let Some(message) = rx.recv().await {
            out.push(message);
        }
        out
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::parse("/start"), Command::Help);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/start@eden_scout_bot"), Command::Help);
        assert_eq!(Command::parse(" 🎯 Check wallet "), Command::CheckPrompt);
        assert_eq!(
            Command::parse(WALLET_A),
            Command::Check(WALLET_A.to_string())
        );
        assert_eq!(
            Command::parse("/unknown"),
            Command::Check("/unknown".to_string())
        );
        let with_address = format!("/help {WALLET_A}");
        assert_eq!(
            Command::parse(&with_address),
            Command::Check(with_address.clone())
        );
        assert_eq!(
            Command::parse("/start@ my bot"),
            Command::Check("/start@ my bot".to_string())
        );
    }

    #[test]
    fn test_keyboard_button_prompts_for_address() {
        let gateway = MarketplaceGateway::new(&MarketplaceConfig {
            api_key: "key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 1,
            activity_page_size: 20,
        })
        .unwrap();
        let settings = ReportConfig {
            recent_activity_limit: 5,
            max_batch: 5,
            batch_delay_ms: 0,
            report_timeout_ms: 1_000,
        };
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(Aggregator::new(gateway, &settings), tx);

        tokio_test::block_on(dispatcher.handle_text(7, format::CHECK_BUTTON));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.text, format::check_prompt());
        assert!(!message.with_keyboard);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_sends_usage_with_keyboard() {
        let server = MockServer::start().await;
        let out = replies(&server, "/start").await;
        assert_eq!(out.len(), 1);
        assert!(out[0].with_keyboard);
        assert!(out[0].text.contains("How to use"));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let server = MockServer::start().await;
        let out = replies(&server, "hello there").await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, format::checking_notice());
        assert_eq!(out[1].text, format::invalid_input());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_wallet_report() {
        let server = marketplace().await;
        let out = replies(&server, WALLET_A).await;
        assert_eq!(out.len(), 2);
        assert!(out[1].text.contains(WALLET_A));
        assert!(out[1].text.contains("✅ *Escrow balance:* 1.25 SOL"));
        assert!(out[1].text.contains("1. buyNow - 3 SOL"));
        assert_eq!(server.received_requests().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_several_wallets_use_batch_summary() {
        let server = marketplace().await;
        let out = replies(&server, &format!("{WALLET_A}\n{WALLET_B}")).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].text, format::found_wallets_notice(2));
        assert!(out[2].text.starts_with("🎯 *Results for 2 wallets*"));
        assert!(!out[2].text.contains("not checked"));
        assert_eq!(server.received_requests().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_polling_answers_and_advances_offset() {
        let telegram = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottoken/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 7}, "text": "/help"}},
                    {"update_id": 11, "message": {"message_id": 2, "chat": {"id": 7}}}
                ]
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&telegram)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottoken/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&telegram)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottoken/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 3}
            })))
            .mount(&telegram)
            .await;

        let client = TelegramClient::new(&TelegramConfig {
            bot_token: "token".to_string(),
            api_url: telegram.uri(),
            poll_timeout_secs: 1,
            poll_retry_secs: 1,
        })
        .unwrap();
        let marketplace = MockServer::start().await;
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Arc::new(Dispatcher::new(aggregator(&marketplace), tx));
        let cancel = CancellationToken::new();

        let sender = tokio::spawn(run_sender(client.clone(), rx, cancel.clone()));
        let poller = tokio::spawn(run_polling(
            client,
            dispatcher,
            Duration::from_secs(1),
            cancel.clone(),
        ));

        let sent = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let requests = telegram.received_requests().await.unwrap();
                let sends: Vec<_> = requests
                    .iter()
                    .filter(|r| r.url.path().ends_with("/sendMessage"))
                    .cloned()
                    .collect();
                let polled_again = requests.iter().any(|r| {
                    r.url.path().ends_with("/getUpdates")
                        && r.body_json::<serde_json::Value>().unwrap()["offset"] == 12
                });
                if !sends.is_empty() && polled_again {
                    return sends;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        poller.await.unwrap();
        sender.await.unwrap();

        assert_eq!(sent.len(), 1);
        let body: serde_json::Value = sent[0].body_json().unwrap();
        assert_eq!(body["chat_id"], 7);
        assert!(body["text"].as_str().unwrap().contains("How to use"));
    }

    #[tokio::test]
    async fn test_panicking_handler_gets_generic_reply() {
        let (tx, mut rx) = mpsc::channel(4);
        spawn_guarded(7, tx, async { panic!("handler bug") })
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(message.chat_id, 7);
        assert_eq!(message.text, format::unexpected_error());
    }

    #[tokio::test]
    async fn test_finished_handler_adds_no_reply() {
        let (tx, mut rx) = mpsc::channel(4);
        spawn_guarded(7, tx, async {}).await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_overflowing_offer_prices_still_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/wallets/[^/]+/offers_made$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tokenMint": "a", "price": "79228162514264337593543950335"},
                {"tokenMint": "b", "price": "79228162514264337593543950335"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/wallets/[^/]+/(activities|tokens|escrow_balance|offers_received)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let out = replies(&server, &format!("{WALLET_A}\n{WALLET_B}")).await;
        assert_eq!(out.len(), 3);
        assert!(out[2].text.contains("📍 *Wallet 2:*"));
        assert!(!out[2].text.contains("❌ error"));
    }

    #[tokio::test]
    async fn test_rejected_markdown_is_resent_plain() {
        let telegram = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottoken/sendMessage"))
            .and(body_partial_json(json!({"parse_mode": "Markdown"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: Can't find end of the entity"
            })))
            .with_priority(1)
            .expect(1)
            .mount(&telegram)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottoken/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 3}
            })))
            .expect(1)
            .mount(&telegram)
            .await;

        let client = TelegramClient::new(&TelegramConfig {
            bot_token: "token".to_string(),
            api_url: telegram.uri(),
            poll_timeout_secs: 1,
            poll_retry_secs: 1,
        })
        .unwrap();

        deliver(&client, &OutgoingMessage::new(7, "odd ` tick")).await;

        let requests = telegram.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let retry: serde_json::Value = requests[1].body_json().unwrap();
        assert!(retry.get("parse_mode").is_none());
        assert_eq!(retry["text"], "odd ` tick");
    }
}
