// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{emulated_device, init_logging};
    use liblldma::{Bank, ChannelReq, DmaDirection, LldmaError, SlotState};
    use xpcie_hw_model::ModelInitParams;

    #[test]
    fn stop_gives_up_after_thirty_polls_against_stuck_hardware() {
        init_logging();
        let params = ModelInitParams {
            always_busy: true,
            ..Default::default()
        };
        let (dev, model) = emulated_device(0x4000_0000, 4, params);

        let (chid, _) = dev
            .acquire(DmaDirection::DevToHost, ChannelReq::Auto, "stuck")
            .unwrap();
        assert_eq!(model.stat_reads(Bank::Dequeue, chid), 0);

        // 3000 ms ceiling at 100 ms per poll: exactly 30 status reads, and
        // with the injected no-op sleep the whole wait is instantaneous.
        assert_eq!(
            dev.release(chid, DmaDirection::DevToHost),
            Err(LldmaError::HardwareTimeout {
                chid,
                timeout_ms: 3000
            })
        );
        assert_eq!(model.stat_reads(Bank::Dequeue, chid), 30);
    }

    #[test]
    fn timed_out_release_still_frees_the_slot() {
        let params = ModelInitParams {
            always_busy: true,
            ..Default::default()
        };
        let (dev, _) = emulated_device(0x4000_0000, 4, params);

        dev.acquire(DmaDirection::HostToDev, ChannelReq::Id(1), "stuck")
            .unwrap();
        assert!(dev.release(1, DmaDirection::HostToDev).is_err());

        // The slot is cleaned up even though the hardware never drained;
        // the connector is gone and the channel can be acquired again.
        assert_eq!(
            dev.slot_state(Bank::Enqueue, 1).unwrap(),
            SlotState::Free
        );
        assert_eq!(
            liblldma::find(&dev, "stuck"),
            Err(LldmaError::NotFound("stuck".to_string()))
        );
        dev.acquire(DmaDirection::HostToDev, ChannelReq::Id(1), "again")
            .unwrap();
    }

    #[test]
    fn clean_drain_finalizes_with_the_clear_bit() {
        let (dev, model) = emulated_device(0x4000_0000, 4, ModelInitParams::default());

        let (chid, _) = dev
            .acquire(DmaDirection::DevToHost, ChannelReq::Auto, "clean")
            .unwrap();
        dev.release(chid, DmaDirection::DevToHost).unwrap();

        // Default model settles after two busy reads: one extra read
        // observes idle, then stop finalizes.
        assert_eq!(model.stat_reads(Bank::Dequeue, chid), 3);
        assert_eq!(
            dev.slot_state(Bank::Dequeue, chid).unwrap(),
            SlotState::Free
        );
    }
}
