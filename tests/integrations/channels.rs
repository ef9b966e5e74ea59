//! HTTP channel adapters against a mock server.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::fast_dispatch_config;
use notifan::channels::{
    bark::BarkChannel,
    dingtalk::{self, DingTalkChannel},
    gotify::GotifyChannel,
    igot::IGotChannel,
    pushdeer::PushDeerChannel,
    pushplus::PushPlusChannel,
    qmsg::QmsgChannel,
    serverchan::ServerChanChannel,
    smtp::SmtpChannel,
    telegram::TelegramChannel,
    wecom::{WeComAppChannel, WeComBotChannel},
};
use notifan::config::{
    BarkConfig, DingTalkConfig, GotifyConfig, IGotConfig, PushDeerConfig, PushPlusConfig,
    QmsgConfig, ServerChanConfig, SmtpConfig, TelegramConfig, WeComAppConfig, WeComBotConfig,
};
use notifan::core::{ChannelAdapter, ErrorKind};
use notifan::dispatch;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_bark_success_and_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devkey/Hello/World"))
        .and(query_param("group", "ops"))
        .respond_with(ok_json(json!({"code": 200, "message": "success"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/badkey/Hello/World"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            json!({"code": 400, "message": "failed to get device token"}),
        ))
        .mount(&server)
        .await;

    let bark = BarkChannel::new(
        BarkConfig {
            push: Some(format!("{}/devkey", server.uri())),
            group: Some("ops".into()),
            ..Default::default()
        },
        client(),
    );
    let result = bark.send("Hello", "World").await.unwrap();
    assert!(result.success, "{:?}", result);

    let bark = BarkChannel::new(
        BarkConfig {
            push: Some(format!("{}/badkey", server.uri())),
            ..Default::default()
        },
        client(),
    );
    let result = bark.send("Hello", "World").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("failed to get device token"));
}

#[tokio::test]
async fn test_gotify_posts_form_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/message"))
        .and(query_param("token", "apptoken"))
        .and(body_string_contains("title=T"))
        .and(body_string_contains("priority=3"))
        .respond_with(ok_json(json!({"id": 17, "title": "T"})))
        .expect(1)
        .mount(&server)
        .await;

    let gotify = GotifyChannel::new(
        GotifyConfig {
            url: Some(format!("{}/", server.uri())),
            token: Some("apptoken".into()),
            priority: 3,
        },
        client(),
    );
    assert!(gotify.send("T", "body").await.unwrap().success);
}

#[tokio::test]
async fn test_unparseable_url_is_a_configuration_error() {
    let gotify = GotifyChannel::new(
        GotifyConfig {
            url: Some("not a url".into()),
            token: Some("apptoken".into()),
            priority: 0,
        },
        client(),
    );
    let err = gotify.send("T", "body").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);

    // Configuration errors are never retried, so the failure is immediate.
    let channels: Vec<Arc<dyn ChannelAdapter>> = vec![Arc::new(gotify)];
    let summary = dispatch("T", "body", &channels, &fast_dispatch_config()).await;
    assert_eq!(summary.failed, vec!["Gotify"]);
    assert!(
        summary.errors[0].starts_with("Gotify: configuration error"),
        "{:?}",
        summary.errors
    );
}

#[tokio::test]
async fn test_dingtalk_signs_each_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/robot/send"))
        .and(query_param("access_token", "ddtoken"))
        .and(body_json(json!({"msgtype": "text", "text": {"content": "t\n\nc"}})))
        .respond_with(ok_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let channel = DingTalkChannel::new(
        DingTalkConfig {
            token: Some("ddtoken".into()),
            secret: Some("SECsecret".into()),
            url: Some(format!("{}/robot/send", server.uri())),
        },
        client(),
    );
    assert!(channel.send("t", "c").await.unwrap().success);

    let requests = server.received_requests().await.unwrap();
    let query: std::collections::HashMap<_, _> = requests[0].url.query_pairs().collect();
    let timestamp: i64 = query["timestamp"].parse().unwrap();
    assert_eq!(query["sign"], dingtalk::sign("SECsecret", timestamp).unwrap());
}

#[tokio::test]
async fn test_dingtalk_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_json(json!({"errcode": 310000, "errmsg": "sign not match"})))
        .mount(&server)
        .await;

    let channel = DingTalkChannel::new(
        DingTalkConfig {
            token: Some("ddtoken".into()),
            secret: Some("wrong".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    let result = channel.send("t", "c").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("sign not match"));
}

fn wecom_app(server: &MockServer) -> WeComAppChannel {
    WeComAppChannel::new(
        WeComAppConfig {
            corp_id: Some("ww1".into()),
            corp_secret: Some("secret".into()),
            agent_id: Some("1000002".into()),
            url: Some(server.uri()),
            ..Default::default()
        },
        client(),
    )
}

#[tokio::test]
async fn test_wecom_app_exchanges_token_then_sends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gettoken"))
        .and(query_param("corpid", "ww1"))
        .and(query_param("corpsecret", "secret"))
        .respond_with(ok_json(json!({"errcode": 0, "access_token": "TOKEN", "expires_in": 7200})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/message/send"))
        .and(query_param("access_token", "TOKEN"))
        .and(body_string_contains("\"agentid\":\"1000002\""))
        .and(body_string_contains("\"touser\":\"@all\""))
        .respond_with(ok_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(wecom_app(&server).send("t", "c").await.unwrap().success);
}

#[tokio::test]
async fn test_wecom_app_token_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gettoken"))
        .respond_with(ok_json(json!({"errcode": 40001, "errmsg": "invalid credential"})))
        .mount(&server)
        .await;

    let result = wecom_app(&server).send("t", "c").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("invalid credential"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

/// A single-session SMTP server that accepts everything and returns the
/// commands and message it received.
async fn smtp_sink() -> (u16, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut transcript = String::new();
        let mut in_data = false;
        write.write_all(b"220 localhost ESMTP\r\n").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            transcript.push_str(&line);
            transcript.push('\n');
            if in_data {
                if line == "." {
                    in_data = false;
                    write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                }
                continue;
            }
            let verb = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
            let reply: &[u8] = match verb.as_str() {
                "EHLO" => b"250-localhost\r\n250 AUTH PLAIN\r\n",
                "AUTH" => b"235 2.7.0 accepted\r\n",
                "MAIL" | "RCPT" => b"250 2.1.0 ok\r\n",
                "DATA" => {
                    in_data = true;
                    b"354 end with .\r\n"
                }
                "QUIT" => {
                    let _ = write.write_all(b"221 bye\r\n").await;
                    break;
                }
                _ => b"502 unknown\r\n",
            };
            write.write_all(reply).await.unwrap();
        }
        transcript
    });
    (port, handle)
}

fn smtp_config(port: u16) -> SmtpConfig {
    SmtpConfig {
        server: Some(format!("127.0.0.1:{}", port)),
        ssl: false,
        email: Some("me@example.com".into()),
        password: Some("pw".into()),
        name: Some("notifan".into()),
    }
}

#[tokio::test]
async fn test_smtp_delivers_mail_to_the_account() {
    let (port, server) = smtp_sink().await;
    let channel = SmtpChannel::new(smtp_config(port));
    assert!(channel.is_configured());

    let result = channel.send("Deploy", "all green").await.unwrap();
    assert!(result.success, "{:?}", result);

    let transcript = server.await.unwrap();
    assert!(transcript.contains("AUTH PLAIN"));
    assert!(transcript.contains("MAIL FROM:<me@example.com>"));
    assert!(transcript.contains("RCPT TO:<me@example.com>"));
    assert!(transcript.contains("Subject: Deploy"));
    assert!(transcript.contains("all green"));
}

#[tokio::test]
async fn test_smtp_refused_connection_is_a_network_error() {
    // Nothing listens on port 1.
    let err = SmtpChannel::new(smtp_config(1))
        .send("t", "c")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
}

#[tokio::test]
async fn test_telegram_reports_description_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("chat_id=42"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}),
        ))
        .mount(&server)
        .await;

    let telegram = TelegramChannel::new(TelegramConfig {
        bot_token: Some("123:abc".into()),
        user_id: Some("42".into()),
        api_host: Some(server.uri()),
        ..Default::default()
    })
    .unwrap();
    assert!(telegram.is_configured());
    let result = telegram.send("t", "c").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Bad Request: chat not found"));
}

#[tokio::test]
async fn test_pushplus_sends_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "token": "tok",
            "title": "t",
            "content": "c",
            "topic": "",
        })))
        .respond_with(ok_json(json!({"code": 200, "msg": "ok", "data": "id"})))
        .mount(&server)
        .await;

    let pushplus = PushPlusChannel::new(
        PushPlusConfig {
            token: Some("tok".into()),
            url: Some(format!("{}/send", server.uri())),
            ..Default::default()
        },
        client(),
    );
    assert!(pushplus.send("t", "c").await.unwrap().success);
}

#[tokio::test]
async fn test_serverchan_uses_errno_or_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/SCTkey.send"))
        .and(body_string_contains("desp=a%0A%0Ab"))
        .respond_with(ok_json(json!({"code": 0, "message": "", "data": {}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/SCUold.send"))
        .respond_with(ok_json(json!({"errno": 1024, "errmsg": "bad pushtoken"})))
        .mount(&server)
        .await;

    let config = |key: &str| ServerChanConfig {
        key: Some(key.into()),
        url: Some(server.uri()),
    };
    let channel = ServerChanChannel::new(config("SCTkey"), client());
    assert!(channel.send("t", "a\nb").await.unwrap().success);

    let channel = ServerChanChannel::new(config("SCUold"), client());
    let result = channel.send("t", "c").await.unwrap();
    assert_eq!(result.error.as_deref(), Some("bad pushtoken"));
}

#[tokio::test]
async fn test_wecom_bot_text_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("key", "robot"))
        .and(body_json(json!({"msgtype": "text", "text": {"content": "t\n\nc"}})))
        .respond_with(ok_json(json!({"errcode": 0, "errmsg": "ok"})))
        .mount(&server)
        .await;

    let wecom = WeComBotChannel::new(
        WeComBotConfig {
            key: Some("robot".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    assert!(wecom.send("t", "c").await.unwrap().success);
}

#[tokio::test]
async fn test_pushdeer_empty_result_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("pushkey=PDU1"))
        .respond_with(ok_json(json!({"code": 0, "content": {"result": []}})))
        .mount(&server)
        .await;

    let pushdeer = PushDeerChannel::new(
        PushDeerConfig {
            key: Some("PDU1".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    let result = pushdeer.send("t", "c").await.unwrap();
    assert!(!result.success);
}

#[tokio::test]
async fn test_qmsg_and_igot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/group/qkey"))
        .respond_with(ok_json(json!({"success": true, "code": 0, "reason": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ikey"))
        .respond_with(ok_json(json!({"ret": 201, "errMsg": "key invalid"})))
        .mount(&server)
        .await;

    let qmsg = QmsgChannel::new(
        QmsgConfig {
            key: Some("qkey".into()),
            kind: Some("group".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    assert!(qmsg.send("t", "a----b").await.unwrap().success);

    let igot = IGotChannel::new(
        IGotConfig {
            key: Some("ikey".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    let result = igot.send("t", "c").await.unwrap();
    assert_eq!(result.error.as_deref(), Some("key invalid"));
}

#[tokio::test]
async fn test_server_errors_are_temporary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let igot = IGotChannel::new(
        IGotConfig {
            key: Some("k".into()),
            url: Some(server.uri()),
        },
        client(),
    );
    let err = igot.send("t", "c").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Temporary);
}

#[tokio::test]
async fn test_dispatch_retries_a_transient_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/key"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/key"))
        .respond_with(ok_json(json!({"ret": 0})))
        .mount(&server)
        .await;

    let channels: Vec<Arc<dyn ChannelAdapter>> = vec![Arc::new(IGotChannel::new(
        IGotConfig {
            key: Some("key".into()),
            url: Some(server.uri()),
        },
        client(),
    ))];
    let summary = dispatch("t", "c", &channels, &fast_dispatch_config()).await;

    assert_eq!(summary.successful, vec!["iGot"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
