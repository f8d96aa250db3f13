// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{emulated_device, init_logging};
    use liblldma::{
        d2d_connect, d2d_disconnect, find, Bank, ChannelReq, D2dMode, D2dRequest, DmaDirection,
        LldmaError, SlotState,
    };
    use xpcie_hw_model::ModelInitParams;
    use xpcie_registers::ModeReg;

    fn link_request(mode: D2dMode, buf_addr: u64) -> D2dRequest<'static> {
        D2dRequest {
            tx_chid: 0,
            rx_chid: 3,
            mode,
            buf_addr,
            buf_size: 0x4_0000,
            connector_id: "card-to-card",
        }
    }

    #[test]
    fn buffered_link_end_to_end() {
        init_logging();
        let (tx_dev, tx_model) = emulated_device(0x4000_0000, 8, ModelInitParams::default());
        let (rx_dev, rx_model) = emulated_device(0x8000_0000, 8, ModelInitParams::default());

        d2d_connect(
            &tx_dev,
            &rx_dev,
            &link_request(D2dMode::HostBuffered, 0x7f00_0000),
        )
        .unwrap();

        // Each end points at the other card and names the peer channel.
        let tx_ch = tx_model.channel(Bank::Dequeue, 0);
        assert_eq!(tx_ch.peer_addr, 0x8000_0000);
        assert_eq!(ModeReg(tx_ch.mode).peer_chid(), 3);
        assert_eq!(ModeReg(tx_ch.mode).mode(), u8::from(D2dMode::HostBuffered));
        let rx_ch = rx_model.channel(Bank::Enqueue, 3);
        assert_eq!(rx_ch.peer_addr, 0x4000_0000);
        assert_eq!(ModeReg(rx_ch.mode).peer_chid(), 0);

        // Both sides share the same staging buffer.
        assert_eq!(tx_model.buffer(Bank::Dequeue), (0x7f00_0000, 0x4_0000));
        assert_eq!(rx_model.buffer(Bank::Enqueue), (0x7f00_0000, 0x4_0000));

        // Either side can rendezvous with its end by connector id.
        assert_eq!(
            find(&tx_dev, "card-to-card"),
            Ok((0, DmaDirection::D2dTx))
        );
        assert_eq!(
            find(&rx_dev, "card-to-card"),
            Ok((3, DmaDirection::D2dRx))
        );

        d2d_disconnect(&tx_dev, 0, &rx_dev, 3).unwrap();
        assert_eq!(
            tx_dev.slot_state(Bank::Dequeue, 0).unwrap(),
            SlotState::Free
        );
        assert_eq!(
            rx_dev.slot_state(Bank::Enqueue, 3).unwrap(),
            SlotState::Free
        );
    }

    #[test]
    fn direct_link_skips_the_staging_buffer() {
        let (tx_dev, tx_model) = emulated_device(0x4000_0000, 8, ModelInitParams::default());
        let (rx_dev, rx_model) = emulated_device(0x8000_0000, 8, ModelInitParams::default());

        d2d_connect(&tx_dev, &rx_dev, &link_request(D2dMode::Direct, 0)).unwrap();

        assert_eq!(tx_model.buffer(Bank::Dequeue), (0, 0));
        assert_eq!(rx_model.buffer(Bank::Enqueue), (0, 0));
    }

    #[test]
    fn failed_rx_side_unwinds_the_whole_link() {
        let (tx_dev, _) = emulated_device(0x4000_0000, 8, ModelInitParams::default());
        let (rx_dev, _) = emulated_device(0x8000_0000, 8, ModelInitParams::default());

        rx_dev
            .acquire(DmaDirection::NetToDev, ChannelReq::Id(3), "squatter")
            .unwrap();

        assert_eq!(
            d2d_connect(&tx_dev, &rx_dev, &link_request(D2dMode::Direct, 0)),
            Err(LldmaError::Busy(3))
        );
        // All-or-nothing: the TX side was undone.
        assert_eq!(
            tx_dev.slot_state(Bank::Dequeue, 0).unwrap(),
            SlotState::Free
        );
        assert_eq!(
            find(&tx_dev, "card-to-card"),
            Err(LldmaError::NotFound("card-to-card".to_string()))
        );
    }

    #[test]
    fn disconnect_tears_down_tx_even_when_rx_is_stuck() {
        init_logging();
        let (tx_dev, _) = emulated_device(0x4000_0000, 8, ModelInitParams::default());
        let stuck = ModelInitParams {
            always_busy: true,
            ..Default::default()
        };
        let (rx_dev, _) = emulated_device(0x8000_0000, 8, stuck);

        d2d_connect(&tx_dev, &rx_dev, &link_request(D2dMode::Direct, 0)).unwrap();

        let result = d2d_disconnect(&tx_dev, 0, &rx_dev, 3);
        assert_eq!(
            result,
            Err(LldmaError::HardwareTimeout {
                chid: 3,
                timeout_ms: 3000
            })
        );
        // The TX teardown still ran.
        assert_eq!(
            tx_dev.slot_state(Bank::Dequeue, 0).unwrap(),
            SlotState::Free
        );
        assert_eq!(
            rx_dev.slot_state(Bank::Enqueue, 3).unwrap(),
            SlotState::Free
        );
    }
}
