use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use print_watch::alerts::{AlertDispatcher, AlertOutcome, AlertSink, TelegramSink};
use print_watch::composer::ComposedAlert;
use print_watch::error::{AlertError, InputError};
use print_watch::server::decode_frame;

fn alert() -> ComposedAlert {
    ComposedAlert {
        caption: "⚠ 3D print error detected ⚠\n\n🔹 spaghetti\n".to_string(),
        image: vec![0xFF, 0xD8, 0xFF, 0xD9],
        file_name: "detection.jpg".to_string(),
    }
}

/// Serve exactly one HTTP exchange and hand back the raw request text.
fn one_shot_bot_api(
    status_line: &'static str,
    body: &'static str,
) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream);
        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).expect("write response");
        request
    });

    (format!("http://{}", address), handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).expect("read request");
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let Some(head_end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..head_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        let complete = match content_length {
            Some(length) => data.len() >= head_end + 4 + length,
            None if head.contains("transfer-encoding: chunked") => data.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

#[test]
fn test_telegram_sink_rejection_carries_raw_response() {
    const REJECTION: &str = r#"{"ok":false,"description":"Bad Request: chat not found"}"#;
    let (api_url, server) = one_shot_bot_api("HTTP/1.1 400 Bad Request", REJECTION);
    let sink = TelegramSink::new(api_url, "123456:secret-token".to_string(), "-1001".to_string());

    match sink.deliver(&alert()) {
        Err(AlertError::DeliveryFailed { reason }) => assert_eq!(reason, REJECTION),
        other => panic!("expected delivery failure, got {:?}", other),
    }

    let request = server.join().expect("server thread");
    let lowered = request.to_lowercase();
    assert!(request.starts_with("POST /bot123456:secret-token/sendPhoto "));
    assert!(request.contains("name=\"chat_id\"\r\n\r\n-1001\r\n"));
    assert!(request.contains(
        "name=\"caption\"\r\n\r\n⚠ 3D print error detected ⚠\n\n🔹 spaghetti\n\r\n"
    ));
    assert!(request.contains("name=\"parse_mode\"\r\n\r\nMarkdown\r\n"));
    assert!(lowered.contains("name=\"photo\"; filename=\"detection.jpg\""));
    assert!(lowered.contains("content-type: image/jpeg"));
}

#[test]
fn test_telegram_sink_accepts_success_status() {
    let (api_url, server) = one_shot_bot_api("HTTP/1.1 200 OK", r#"{"ok":true}"#);
    let sink = TelegramSink::new(api_url, "123456:secret-token".to_string(), "-1001".to_string());

    assert!(sink.deliver(&alert()).is_ok());
    server.join().expect("server thread");
}

#[test]
fn test_telegram_sink_unreachable_endpoint() {
    // Nothing listens on the discard port, so the request fails at the transport level
    let sink = TelegramSink::new(
        "http://127.0.0.1:9".to_string(),
        "123456:secret-token".to_string(),
        "-1001".to_string(),
    );

    match sink.deliver(&alert()) {
        Err(AlertError::DeliveryFailed { reason }) => {
            assert!(!reason.is_empty());
            assert!(!reason.contains("secret-token"), "token leaked: {}", reason);
        }
        other => panic!("expected delivery failure, got {:?}", other),
    }
}

#[test]
fn test_dispatcher_downgrades_transport_failure() {
    let sink = TelegramSink::new(
        "http://127.0.0.1:9".to_string(),
        "123456:secret-token".to_string(),
        "-1001".to_string(),
    );
    let outcome = AlertDispatcher::new(Arc::new(sink)).dispatch(&alert());

    assert!(matches!(outcome, AlertOutcome::DeliveryFailed { .. }));
    assert_eq!(outcome.status(), "error");
}

#[test]
fn test_decode_frame() {
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(4, 3)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");

    let frame = decode_frame(&png).expect("decode");
    assert_eq!((frame.width(), frame.height()), (4, 3));

    assert!(matches!(
        decode_frame(b""),
        Err(InputError::Undecodable { .. })
    ));
    assert!(matches!(
        decode_frame(b"definitely not an image"),
        Err(InputError::Undecodable { .. })
    ));
}
