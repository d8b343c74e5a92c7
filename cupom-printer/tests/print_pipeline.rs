//! End-to-end pipeline tests against a local TCP listener

use std::sync::Arc;

use cupom_printer::{
    Confidence, DiscoveredPrinter, HostOs, PrintRequest, PrintService, PrinterConfig,
    PrinterStatus, StaticDiscovery, TransportKind, resolve,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

fn printer(name: &str, reference: &str) -> DiscoveredPrinter {
    DiscoveredPrinter {
        display_name: name.to_string(),
        device_reference: reference.to_string(),
        status: PrinterStatus::Ready,
        is_default: false,
    }
}

fn service(os: HostOs, printers: Vec<DiscoveredPrinter>) -> PrintService {
    PrintService::with_discovery(
        PrinterConfig::default(),
        os,
        Arc::new(StaticDiscovery::new(printers)),
    )
}

/// Accept one connection and return (connections seen, bytes received)
async fn capture(listener: TcpListener) -> (usize, Vec<u8>) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = Vec::new();
    socket.read_to_end(&mut buf).await.unwrap();

    // A second connection would show up within this window
    let extra = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        listener.accept(),
    )
    .await
    .is_ok();
    (1 + usize::from(extra), buf)
}

#[tokio::test]
async fn hello_is_framed_and_sent_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(capture(listener));

    let report = service(HostOs::Linux, vec![])
        .print_job(&PrintRequest {
            payload: b"HELLO".to_vec(),
            printer_type: "GENERICA_ESCPOS".to_string(),
            device_reference: addr.to_string(),
            display_name: None,
        })
        .await
        .unwrap();

    let mut expected = vec![0x1B, 0x40];
    expected.extend_from_slice(b"HELLO");
    expected.extend_from_slice(&[0x0A, 0x0A, 0x0A]);
    expected.extend_from_slice(&[0x1B, 0x69]);
    expected.extend_from_slice(&[0x1D, 0x56, 0x42, 0x00]);
    expected.push(0x0A);

    let (connections, received) = server.await.unwrap();
    assert_eq!(report.transport, TransportKind::Socket);
    assert_eq!(report.bytes, expected.len());
    assert_eq!(connections, 1);
    assert_eq!(received, expected);
}

#[tokio::test]
async fn accented_text_selects_code_page() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(capture(listener));

    service(HostOs::Windows, vec![])
        .print_job(&PrintRequest {
            payload: "Pão".as_bytes().to_vec(),
            printer_type: "DARUMA_DR800".to_string(),
            device_reference: addr.to_string(),
            display_name: None,
        })
        .await
        .unwrap();

    let (_, received) = server.await.unwrap();
    // reset, CP850 select, "P" 0xC6 "o"
    assert_eq!(&received[..9], &[0x1B, 0x40, 0x1B, 0x74, 0x02, b'P', 0xC6, b'o', 0x0A]);
}

#[tokio::test]
async fn unreachable_socket_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = service(HostOs::MacOs, vec![])
        .print_job(&PrintRequest {
            payload: b"HELLO".to_vec(),
            printer_type: "EPSON_TM_T20X".to_string(),
            device_reference: addr.to_string(),
            display_name: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), cupom_printer::ErrorKind::Transport);
}

#[test]
fn verbatim_reference_is_exact() {
    let discovered = vec![
        printer("Cozinha", "Impressora Cozinha"),
        printer("Impressora Caixa 1", "Impressora Caixa 1"),
    ];
    let target = resolve("Impressora Caixa 1", None, &discovered).unwrap();
    assert_eq!(target.confidence, Confidence::Exact);
    assert_eq!(target.display_name.as_deref(), Some("Impressora Caixa 1"));
}

#[test]
fn substring_reference_is_partial() {
    let discovered = vec![printer("Caixa", "Caixa 1")];
    let target = resolve("Impressora Caixa 1", None, &discovered).unwrap();
    assert_eq!(target.confidence, Confidence::PartialMatch);
    assert_eq!(target.display_name.as_deref(), Some("Caixa"));
}

#[test]
fn exact_reference_beats_name_match() {
    let discovered = vec![printer("COM3", "USB001"), printer("Caixa", "COM3")];
    let target = resolve("COM3", None, &discovered).unwrap();
    assert_eq!(target.confidence, Confidence::Exact);
    assert_eq!(target.display_name.as_deref(), Some("Caixa"));
}

#[test]
fn undiscovered_com_port_passes_through() {
    let discovered = vec![printer("Caixa", "COM3")];
    let target = resolve("COM7", None, &discovered).unwrap();
    assert_eq!(target.confidence, Confidence::HeuristicPassThrough);
    assert_eq!(target.reference.to_string(), "COM7");
}
