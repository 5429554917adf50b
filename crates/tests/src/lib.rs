//! # Integration Tests
//!
//! End-to-end tests over loopback TCP.
//!
//! Covers:
//! - scripted sources -> snapshot store -> sessions
//! - negotiation failures and disconnects
//! - per-subscriber cadence and encoding

#[cfg(test)]
mod harness;

#[cfg(test)]
mod contract_tests {
    use contracts::{SourceId, SpuSnapshot, PLC_VARIABLE_COUNT, SPU_FLAG_COUNT, SPU_MEASUREMENT_COUNT};

    #[test]
    fn test_wire_tables_match_counts() {
        assert_eq!(SpuSnapshot::MEASUREMENT_NAMES.len(), SPU_MEASUREMENT_COUNT);
        assert_eq!(SpuSnapshot::FLAG_NAMES.len(), SPU_FLAG_COUNT);
        assert_eq!(contracts::PlcSnapshot::VARIABLE_NAMES.len(), PLC_VARIABLE_COUNT);
        assert_eq!(dispatcher::FRAME_LEN, 288);
        assert_eq!(SourceId::ALL.map(SourceId::wire_key), ["SPU_CHA", "SPU_CHB", "PLC"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::{DriverError, SourceId};
    use dispatcher::{decode_binary, parse_text};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::{timeout, Instant};

    use crate::harness::{
        eventually, plc, read_binary_frame, read_text_frame, spu, subscribe, test_server_config,
        TestHub,
    };

    /// Neutron rate and temperature come back out of a text frame unchanged
    #[tokio::test]
    async fn test_text_frame_carries_published_values() {
        let hub = TestHub::start().await;
        hub.publish(SourceId::SpuChA, spu(12.5, 300.0)).await;
        hub.publish(SourceId::SpuChB, spu(0.0, 0.0)).await;
        hub.publish(SourceId::Plc, plc(0.0)).await;

        let mut client = subscribe(hub.addr, "1000 text\n").await;
        let frame = timeout(Duration::from_secs(2), read_text_frame(&mut client))
            .await
            .unwrap();

        let parsed = parse_text(&frame).unwrap();
        assert_eq!(parsed.get("SPU_CHA", "N_DATA_FP"), Some(12.5));
        assert_eq!(parsed.get("SPU_CHA", "T_DATA_FP"), Some(300.0));
        assert_eq!(parsed.get("SPU_CHA", "STALE"), Some(0.0));

        drop(client);
        hub.shutdown().await;
    }

    /// Each source's block reflects its own latest publish
    #[tokio::test]
    async fn test_sources_update_independently() {
        let hub = TestHub::start().await;
        hub.publish(SourceId::SpuChA, spu(111.0, 1.0)).await;
        hub.publish(SourceId::Plc, plc(7.0)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.publish(SourceId::SpuChB, spu(222.0, 2.0)).await;
        hub.publish(SourceId::SpuChA, spu(333.0, 3.0)).await;

        let mut client = subscribe(hub.addr, "1000 binary\n").await;
        let frame = decode_binary(&read_binary_frame(&mut client).await).unwrap();

        assert_eq!(frame.spu_ch_a.n_data, 333.0);
        assert_eq!(frame.spu_ch_b.n_data, 222.0);
        assert_eq!(frame.plc.barra_reg, 7.0);
        assert_eq!(frame.available, 0b111);
        assert_eq!(frame.stale, 0);

        drop(client);
        hub.shutdown().await;
    }

    /// A failing source keeps serving its last good reading
    #[tokio::test]
    async fn test_failed_reads_keep_last_snapshot() {
        let hub = TestHub::start().await;
        hub.publish_all().await;
        for _ in 0..3 {
            hub.source(SourceId::SpuChB).push_err(DriverError::Disconnected {
                source_id: SourceId::SpuChB,
            });
        }
        assert!(eventually(|| hub.source(SourceId::SpuChB).pending() == 0).await);

        let mut client = subscribe(hub.addr, "50 text\n").await;
        let parsed = parse_text(&read_text_frame(&mut client).await).unwrap();
        assert_eq!(parsed.get("SPU_CHB", "N_DATA_FP"), Some(2.0));

        drop(client);
        hub.shutdown().await;
    }

    /// Disconnecting after two frames frees the session and the server keeps serving
    #[tokio::test]
    async fn test_disconnect_releases_session() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut first = subscribe(hub.addr, "500\n").await;
        for _ in 0..2 {
            read_text_frame(&mut first).await;
        }
        assert_eq!(hub.registry.active_count(), 1);
        drop(first);

        let registry = hub.registry.clone();
        assert!(eventually(|| registry.active_count() == 0).await);

        let mut second = subscribe(hub.addr, "100 binary\n").await;
        let frame = decode_binary(&read_binary_frame(&mut second).await).unwrap();
        assert_eq!(frame.available, 0b111);
        assert_eq!(hub.registry.total_opened(), 2);

        drop(second);
        let stats = hub.shutdown().await;
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.abandoned, 0);
    }

    /// Shutting down the client's write side after the request does not end the stream
    #[tokio::test]
    async fn test_half_closed_client_keeps_receiving() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut client = subscribe(hub.addr, "50 binary\n").await;
        client.shutdown().await.unwrap();

        for _ in 0..5 {
            let frame = timeout(Duration::from_secs(1), read_binary_frame(&mut client))
                .await
                .unwrap();
            assert_eq!(decode_binary(&frame).unwrap().available, 0b111);
        }
        assert_eq!(hub.registry.active_count(), 1);

        drop(client);
        let registry = hub.registry.clone();
        assert!(eventually(|| registry.active_count() == 0).await);
        hub.shutdown().await;
    }

    /// A bare number followed by EOF is served like a full request line
    #[tokio::test]
    async fn test_bare_number_then_eof_is_served() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut client = subscribe(hub.addr, "50").await;
        client.shutdown().await.unwrap();

        for _ in 0..3 {
            let frame = timeout(Duration::from_secs(1), read_text_frame(&mut client))
                .await
                .unwrap();
            assert_eq!(parse_text(&frame).unwrap().blocks.len(), 3);
        }

        drop(client);
        hub.shutdown().await;
    }

    /// A bare number with no terminator is served once the negotiation deadline passes
    #[tokio::test]
    async fn test_bare_number_served_after_deadline() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let started = Instant::now();
        let mut client = subscribe(hub.addr, "500").await;
        let frame = timeout(Duration::from_secs(2), read_text_frame(&mut client))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(parse_text(&frame).unwrap().get("SPU_CHA", "N_DATA_FP"), Some(1.0));

        // still streaming at the requested cadence
        timeout(Duration::from_secs(2), read_text_frame(&mut client))
            .await
            .unwrap();
        assert_eq!(hub.registry.active_count(), 1);

        drop(client);
        hub.shutdown().await;
    }

    /// A non-numeric request closes only that connection
    #[tokio::test]
    async fn test_garbage_request_closes_connection() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut bad = subscribe(hub.addr, "notanumber\n").await;
        let mut buf = Vec::new();
        let read = timeout(Duration::from_secs(2), bad.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0, "rejected client received data");

        let registry = hub.registry.clone();
        assert!(eventually(|| registry.active_count() == 0).await);

        let mut good = subscribe(hub.addr, "100\n").await;
        let parsed = parse_text(&read_text_frame(&mut good).await).unwrap();
        assert_eq!(parsed.blocks.len(), 3);

        drop(good);
        hub.shutdown().await;
    }

    /// Out-of-range intervals are refused rather than clamped
    #[tokio::test]
    async fn test_out_of_range_interval_rejected() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut client = subscribe(hub.addr, "1\n").await;
        let mut buf = Vec::new();
        let read = timeout(Duration::from_secs(2), client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);

        hub.shutdown().await;
    }

    /// Two subscribers with different intervals each get their own cadence
    #[tokio::test]
    async fn test_independent_cadence() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let fast = subscribe(hub.addr, "200 binary\n").await;
        let slow = subscribe(hub.addr, "1000 binary\n").await;

        let window = Duration::from_millis(1100);
        let count = |mut stream: tokio::net::TcpStream| async move {
            let deadline = Instant::now() + window;
            let mut frames = 0usize;
            while timeout(deadline.saturating_duration_since(Instant::now()), read_binary_frame(&mut stream))
                .await
                .is_ok()
            {
                frames += 1;
            }
            frames
        };
        let (fast_frames, slow_frames) = tokio::join!(count(fast), count(slow));

        assert!(fast_frames >= 4, "fast subscriber got {fast_frames} frames");
        assert!((1..=2).contains(&slow_frames), "slow subscriber got {slow_frames} frames");

        hub.shutdown().await;
    }

    /// Text and binary subscribers see the same reading
    #[tokio::test]
    async fn test_text_and_binary_agree() {
        let hub = TestHub::start().await;
        hub.publish(SourceId::SpuChA, spu(4.25, 310.5)).await;
        hub.publish(SourceId::SpuChB, spu(5.5, 299.75)).await;
        hub.publish(SourceId::Plc, plc(42.125)).await;

        let mut text = subscribe(hub.addr, "1000 text\n").await;
        let mut binary = subscribe(hub.addr, "1000 binary\n").await;
        let parsed = parse_text(&read_text_frame(&mut text).await).unwrap();
        let frame = decode_binary(&read_binary_frame(&mut binary).await).unwrap();

        for (block, spu) in [("SPU_CHA", &frame.spu_ch_a), ("SPU_CHB", &frame.spu_ch_b)] {
            assert_eq!(parsed.get(block, "N_DATA_FP"), Some(spu.n_data as f64));
            assert_eq!(parsed.get(block, "T_DATA_FP"), Some(spu.t_data as f64));
            assert_eq!(parsed.get(block, "RDY"), Some(1.0));
        }
        assert_eq!(parsed.get("PLC", "BarraReg"), Some(frame.plc.barra_reg as f64));
        assert_eq!(parsed.get("PLC", "STATE"), Some(3.0));

        drop(text);
        drop(binary);
        hub.shutdown().await;
    }

    /// Sessions over the configured limit are refused
    #[tokio::test]
    async fn test_session_limit() {
        let hub = TestHub::start_with(contracts::ServerConfig {
            max_sessions: Some(1),
            ..test_server_config()
        })
        .await;
        hub.publish_all().await;

        let mut kept = subscribe(hub.addr, "100\n").await;
        read_text_frame(&mut kept).await;

        // refused before any request is read
        let mut refused = tokio::net::TcpStream::connect(hub.addr).await.unwrap();
        let mut buf = Vec::new();
        let read = timeout(Duration::from_secs(2), refused.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);

        drop(kept);
        let stats = hub.shutdown().await;
        assert_eq!(stats.refused, 1);
    }

    /// Shutdown closes live sessions within the grace period
    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let hub = TestHub::start().await;
        hub.publish_all().await;

        let mut client = subscribe(hub.addr, "100\n").await;
        read_text_frame(&mut client).await;

        let stats = hub.shutdown().await;
        assert_eq!(stats.abandoned, 0);

        let mut rest = Vec::new();
        timeout(Duration::from_secs(2), client.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
    }
}
