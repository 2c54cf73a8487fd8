//! ISO-on-TCP transport for S7-family controllers.
//!
//! Implements the subset of the S7 protocol the link needs: connect with
//! rack/slot TSAP addressing, negotiate the PDU size, and write bytes into
//! a data block. Three layers ride on the TCP stream:
//!
//! - **TPKT** (RFC 1006): 4-byte packet header carrying the total length.
//! - **COTP** (ISO 8073): connection request/confirm, then data TPDUs.
//! - **S7**: job header + parameters (setup communication, write var).
//!
//! All socket operations carry the configured timeouts, so `open()` and
//! `write_db()` are bounded — a dead controller stalls a single request,
//! never the caller's loop.

use crate::config::PlcConfig;
use crate::transport::{PlcTransport, TransportError};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// COTP connection confirm TPDU code.
const COTP_CC: u8 = 0xD0;
/// S7 ack-data data-item return code for success.
const ITEM_OK: u8 = 0xFF;
/// PDU size requested during setup communication.
const REQUESTED_PDU: u16 = 480;

/// S7 ISO-on-TCP transport.
///
/// Owns the TCP stream; created from [`PlcConfig`] and driven exclusively
/// by [`crate::link::PlcLink`].
pub struct S7Transport {
    endpoint: String,
    rack: u16,
    slot: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
    stream: Option<TcpStream>,
    /// Negotiated PDU length (valid while open).
    pdu_length: u16,
    /// Rolling request reference for matching responses.
    pdu_ref: u16,
}

impl S7Transport {
    /// Create a transport from configuration. Does not connect.
    pub fn from_config(config: &PlcConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            rack: config.rack,
            slot: config.slot,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            io_timeout: Duration::from_millis(config.io_timeout_ms),
            stream: None,
            pdu_length: 0,
            pdu_ref: 0,
        }
    }

    /// Negotiated PDU length, 0 while closed.
    #[inline]
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    fn connect_stream(&self) -> Result<TcpStream, TransportError> {
        let addr = self
            .endpoint
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(format!("resolve {}: {e}", self.endpoint)))?
            .next()
            .ok_or_else(|| {
                TransportError::Connect(format!("no address for {}", self.endpoint))
            })?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.endpoint)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(stream)
    }

    fn next_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }
}

impl PlcTransport for S7Transport {
    fn name(&self) -> &'static str {
        "s7"
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let mut stream = self.connect_stream()?;

        // COTP connection request with rack/slot TSAP addressing.
        let cr = build_cotp_connect(self.rack, self.slot);
        send_packet(&mut stream, &cr).map_err(TransportError::Connect)?;
        let cc = recv_packet(&mut stream).map_err(TransportError::Connect)?;
        if cc.len() < 6 || cc[5] != COTP_CC {
            return Err(TransportError::Protocol(format!(
                "expected COTP connection confirm, got 0x{:02X}",
                cc.get(5).copied().unwrap_or(0)
            )));
        }

        // S7 setup communication: negotiate PDU size and job parallelism.
        let pdu_ref = self.next_ref();
        let setup = build_setup_request(pdu_ref);
        send_packet(&mut stream, &setup).map_err(TransportError::Connect)?;
        let ack = recv_packet(&mut stream).map_err(TransportError::Connect)?;
        check_ack_header(&ack)?;
        if ack.len() < 27 {
            return Err(TransportError::Protocol(format!(
                "setup ack too short: {} bytes",
                ack.len()
            )));
        }
        let negotiated = u16::from_be_bytes([ack[25], ack[26]]);
        if negotiated == 0 {
            return Err(TransportError::Protocol(
                "controller negotiated zero PDU length".to_string(),
            ));
        }

        debug!(
            endpoint = %self.endpoint,
            rack = self.rack,
            slot = self.slot,
            pdu = negotiated,
            "S7 connection established"
        );
        self.pdu_length = negotiated.min(REQUESTED_PDU);
        self.stream = Some(stream);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn write_db(&mut self, db: u16, offset: u16, bytes: &[u8]) -> Result<(), TransportError> {
        let pdu_ref = self.next_ref();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::Write("transport is closed".to_string()))?;

        if bytes.is_empty() {
            return Err(TransportError::Write("empty payload".to_string()));
        }
        // Write header + parameters + data item consume 28 bytes of the PDU.
        let max_payload = self.pdu_length.saturating_sub(28) as usize;
        if bytes.len() > max_payload {
            return Err(TransportError::Write(format!(
                "payload {} bytes exceeds negotiated PDU capacity {}",
                bytes.len(),
                max_payload
            )));
        }

        let request = build_write_request(pdu_ref, db, offset, bytes);
        send_packet(stream, &request).map_err(TransportError::Write)?;
        let ack = recv_packet(stream).map_err(TransportError::Write)?;
        check_ack_header(&ack)?;
        if ack.len() < 22 {
            return Err(TransportError::Protocol(format!(
                "write ack too short: {} bytes",
                ack.len()
            )));
        }
        if ack[21] != ITEM_OK {
            return Err(TransportError::Protocol(format!(
                "data block write rejected, item code 0x{:02X}",
                ack[21]
            )));
        }

        trace!(db, offset, len = bytes.len(), "data block write acknowledged");
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(endpoint = %self.endpoint, "S7 connection closed");
        }
        self.pdu_length = 0;
    }
}

// ─── Packet Builders ────────────────────────────────────────────────

/// COTP connection request (22 bytes).
///
/// Local TSAP is fixed at 0x0100; the remote TSAP encodes the connection
/// type (0x01, PG) in the high byte and `rack * 0x20 + slot` in the low
/// byte, matching the controller's rack/slot addressing.
fn build_cotp_connect(rack: u16, slot: u16) -> Vec<u8> {
    let remote_tsap: u16 = 0x0100 | ((rack as u16) << 5) | (slot as u16 & 0x1F);
    vec![
        // TPKT
        0x03, 0x00, 0x00, 0x16,
        // COTP: length, CR, dst ref, src ref, class 0
        0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00,
        // TPDU size parameter: 1024
        0xC0, 0x01, 0x0A,
        // Calling TSAP
        0xC1, 0x02, 0x01, 0x00,
        // Called TSAP
        0xC2, 0x02, (remote_tsap >> 8) as u8, (remote_tsap & 0xFF) as u8,
    ]
}

/// S7 setup communication job (25 bytes): one parallel job each way,
/// requested PDU size [`REQUESTED_PDU`].
fn build_setup_request(pdu_ref: u16) -> Vec<u8> {
    let r = pdu_ref.to_be_bytes();
    let p = REQUESTED_PDU.to_be_bytes();
    vec![
        // TPKT + COTP data TPDU
        0x03, 0x00, 0x00, 0x19, 0x02, 0xF0, 0x80,
        // S7 job header: protocol id, job, redundancy, ref, param len 8, data len 0
        0x32, 0x01, 0x00, 0x00, r[0], r[1], 0x00, 0x08, 0x00, 0x00,
        // Setup parameters: function 0xF0, max AMQ caller/callee 1, PDU length
        0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, p[0], p[1],
    ]
}

/// S7 write-var job targeting `bytes.len()` bytes of data block `db` at
/// byte `offset`.
fn build_write_request(pdu_ref: u16, db: u16, offset: u16, bytes: &[u8]) -> Vec<u8> {
    let n = bytes.len() as u16;
    let total = 35 + bytes.len() as u16;
    let data_len = 4 + n;
    // Data-block addresses are bit addresses on the wire.
    let bit_addr = (offset as u32) * 8;

    let mut pkt = Vec::with_capacity(total as usize);
    // TPKT + COTP data TPDU
    pkt.extend_from_slice(&[0x03, 0x00]);
    pkt.extend_from_slice(&total.to_be_bytes());
    pkt.extend_from_slice(&[0x02, 0xF0, 0x80]);
    // S7 job header: param len 14, data len 4 + n
    pkt.extend_from_slice(&[0x32, 0x01, 0x00, 0x00]);
    pkt.extend_from_slice(&pdu_ref.to_be_bytes());
    pkt.extend_from_slice(&[0x00, 0x0E]);
    pkt.extend_from_slice(&data_len.to_be_bytes());
    // Write-var parameters: one item, byte-addressed DB area
    pkt.extend_from_slice(&[0x05, 0x01, 0x12, 0x0A, 0x10, 0x02]);
    pkt.extend_from_slice(&n.to_be_bytes());
    pkt.extend_from_slice(&db.to_be_bytes());
    pkt.push(0x84); // area: data block
    pkt.extend_from_slice(&bit_addr.to_be_bytes()[1..4]);
    // Data item: reserved, transport size = bits, length in bits
    pkt.extend_from_slice(&[0x00, 0x04]);
    pkt.extend_from_slice(&(n * 8).to_be_bytes());
    pkt.extend_from_slice(bytes);
    pkt
}

/// Verify the S7 ack-data header error class/code.
fn check_ack_header(packet: &[u8]) -> Result<(), TransportError> {
    if packet.len() < 19 {
        return Err(TransportError::Protocol(format!(
            "response too short: {} bytes",
            packet.len()
        )));
    }
    let (class, code) = (packet[17], packet[18]);
    if class != 0 || code != 0 {
        return Err(TransportError::Protocol(format!(
            "controller error class 0x{class:02X} code 0x{code:02X}"
        )));
    }
    Ok(())
}

// ─── TPKT Framing ───────────────────────────────────────────────────

fn send_packet(stream: &mut TcpStream, packet: &[u8]) -> Result<(), String> {
    stream.write_all(packet).map_err(|e| e.to_string())
}

/// Read one TPKT-framed packet. Returns the full packet including the
/// TPKT header, so S7 offsets match the wire captures they come from.
fn recv_packet(stream: &mut TcpStream) -> Result<Vec<u8>, String> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).map_err(|e| e.to_string())?;
    if header[0] != 0x03 {
        return Err(format!("bad TPKT version 0x{:02X}", header[0]));
    }
    let total = u16::from_be_bytes([header[2], header[3]]) as usize;
    if total < 4 || total > 8192 {
        return Err(format!("implausible TPKT length {total}"));
    }

    let mut packet = vec![0u8; total];
    packet[..4].copy_from_slice(&header);
    stream
        .read_exact(&mut packet[4..])
        .map_err(|e| e.to_string())?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CodeWidth;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn cotp_connect_layout() {
        let pkt = build_cotp_connect(0, 1);
        assert_eq!(pkt.len(), 22);
        assert_eq!(&pkt[..4], &[0x03, 0x00, 0x00, 0x16]);
        assert_eq!(pkt[5], 0xE0); // connection request
        // rack 0 slot 1 → remote TSAP 0x0101
        assert_eq!(&pkt[20..22], &[0x01, 0x01]);

        let pkt = build_cotp_connect(1, 2);
        // rack 1 slot 2 → 0x0100 | 0x20 | 0x02 = 0x0122
        assert_eq!(&pkt[20..22], &[0x01, 0x22]);
    }

    #[test]
    fn setup_request_layout() {
        let pkt = build_setup_request(1);
        assert_eq!(pkt.len(), 25);
        assert_eq!(pkt[7], 0x32); // S7 protocol id
        assert_eq!(pkt[8], 0x01); // job
        assert_eq!(pkt[17], 0xF0); // setup communication
        assert_eq!(&pkt[23..25], &REQUESTED_PDU.to_be_bytes());
    }

    #[test]
    fn write_request_layout() {
        let pkt = build_write_request(2, 1, 0, &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(pkt.len(), 39);
        // TPKT length covers the whole packet.
        assert_eq!(u16::from_be_bytes([pkt[2], pkt[3]]) as usize, pkt.len());
        assert_eq!(pkt[17], 0x05); // write var
        assert_eq!(pkt[18], 0x01); // one item
        assert_eq!(&pkt[23..25], &[0x00, 0x04]); // 4 bytes
        assert_eq!(&pkt[25..27], &[0x00, 0x01]); // db 1
        assert_eq!(pkt[27], 0x84); // DB area
        assert_eq!(&pkt[28..31], &[0x00, 0x00, 0x00]); // bit address 0
        assert_eq!(&pkt[33..35], &(32u16).to_be_bytes()); // 32 bits
        assert_eq!(&pkt[35..], &[0x00, 0x00, 0x00, 0x01]);

        // Byte offset 10 → bit address 80.
        let pkt = build_write_request(3, 2, 10, &[0xAB]);
        assert_eq!(&pkt[28..31], &[0x00, 0x00, 0x50]);
    }

    #[test]
    fn ack_header_check() {
        let mut ok = vec![0u8; 22];
        ok[17] = 0x00;
        ok[18] = 0x00;
        assert!(check_ack_header(&ok).is_ok());

        let mut err = vec![0u8; 22];
        err[17] = 0x81;
        err[18] = 0x04;
        assert!(matches!(
            check_ack_header(&err),
            Err(TransportError::Protocol(_))
        ));

        assert!(check_ack_header(&[0x03, 0x00]).is_err());
    }

    /// Canned COTP connection confirm.
    const CC_RESPONSE: [u8; 22] = [
        0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x0C, 0x00, 0xC0, 0x01, 0x0A, 0xC1,
        0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x01,
    ];

    /// Canned setup ack negotiating PDU length 480.
    const SETUP_ACK: [u8; 27] = [
        0x03, 0x00, 0x00, 0x1B, 0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08,
        0x00, 0x00, 0x00, 0x00, 0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0,
    ];

    /// Canned write ack reporting item success.
    const WRITE_ACK: [u8; 22] = [
        0x03, 0x00, 0x00, 0x16, 0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02,
        0x00, 0x01, 0x00, 0x00, 0x05, 0x01, 0xFF,
    ];

    fn read_framed(stream: &mut TcpStream) -> Vec<u8> {
        recv_packet(stream).expect("framed request")
    }

    /// Full handshake + one data block write against a scripted endpoint.
    #[test]
    fn open_and_write_against_scripted_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let cr = read_framed(&mut stream);
            assert_eq!(cr[5], 0xE0);
            stream.write_all(&CC_RESPONSE).unwrap();

            let setup = read_framed(&mut stream);
            assert_eq!(setup[17], 0xF0);
            stream.write_all(&SETUP_ACK).unwrap();

            let write = read_framed(&mut stream);
            assert_eq!(write[17], 0x05);
            // db 3, byte offset 4, payload [0, 0, 0, 2]
            assert_eq!(&write[25..27], &[0x00, 0x03]);
            assert_eq!(&write[28..31], &[0x00, 0x00, 0x20]);
            assert_eq!(&write[35..39], &[0x00, 0x00, 0x00, 0x02]);
            stream.write_all(&WRITE_ACK).unwrap();
        });

        let mut cfg = PlcConfig::example();
        cfg.address = addr.to_string();
        cfg.db = 3;
        cfg.offset = 4;
        cfg.width = CodeWidth::Four;

        let mut transport = S7Transport::from_config(&cfg);
        transport.open().expect("handshake");
        assert!(transport.is_open());
        assert_eq!(transport.pdu_length(), 480);

        transport
            .write_db(3, 4, &[0x00, 0x00, 0x00, 0x02])
            .expect("write");

        transport.close();
        assert!(!transport.is_open());
        server.join().unwrap();
    }

    #[test]
    fn open_fails_against_closed_port() {
        let mut cfg = PlcConfig::example();
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        cfg.address = format!("127.0.0.1:{port}");
        cfg.connect_timeout_ms = 200;

        let mut transport = S7Transport::from_config(&cfg);
        assert!(matches!(
            transport.open(),
            Err(TransportError::Connect(_))
        ));
        assert!(!transport.is_open());
    }
}
