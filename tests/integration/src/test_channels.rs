// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{emulated_device, init_logging};
    use liblldma::{
        find, Bank, ChannelReq, DmaDirection, LldmaError, SlotState, TransferRequest,
    };
    use std::sync::Arc;
    use xpcie_hw_model::ModelInitParams;

    // Four implemented channel pairs.
    fn four_channel_params() -> ModelInitParams {
        ModelInitParams {
            avail_enq_mask: 0x0f,
            avail_deq_mask: 0x0f,
            ..Default::default()
        }
    }

    #[test]
    fn acquire_contention_scenario() {
        init_logging();
        let (dev, _) = emulated_device(0x4000_0000, 8, four_channel_params());
        assert_eq!(dev.implemented_channels(), 4);

        let (chid, _) = dev
            .acquire(DmaDirection::HostToDev, ChannelReq::Auto, "A")
            .unwrap();
        assert_eq!(chid, 0);

        assert_eq!(
            dev.acquire(DmaDirection::HostToDev, ChannelReq::Id(0), "B"),
            Err(LldmaError::Busy(0))
        );

        dev.release(0, DmaDirection::HostToDev).unwrap();

        let (chid, _) = dev
            .acquire(DmaDirection::HostToDev, ChannelReq::Id(0), "B")
            .unwrap();
        assert_eq!(chid, 0);
    }

    #[test]
    fn every_implemented_channel_round_trips() {
        let (dev, _) = emulated_device(0x4000_0000, 8, four_channel_params());
        for direction in [DmaDirection::HostToDev, DmaDirection::DevToHost] {
            for chid in 0..dev.implemented_channels() {
                let connector = format!("conn-{chid}");
                let (got, mappable) = dev
                    .acquire(direction, ChannelReq::Id(chid), &connector)
                    .unwrap();
                assert_eq!(got, chid);
                // Header plus 255 descriptors, page-rounded.
                assert!(mappable >= 16384);

                dev.release(chid, direction).unwrap();
                assert_eq!(
                    dev.slot_state(direction.bank(), chid).unwrap(),
                    SlotState::Free
                );
                assert_eq!(
                    find(&dev, &connector),
                    Err(LldmaError::NotFound(connector.clone()))
                );
            }
        }
    }

    #[test]
    fn acquire_beyond_implemented_range_is_rejected() {
        let (dev, _) = emulated_device(0x4000_0000, 8, four_channel_params());
        assert_eq!(
            dev.acquire(DmaDirection::DevToHost, ChannelReq::Id(4), "conn"),
            Err(LldmaError::InvalidChannel {
                chid: 4,
                implemented: 4
            })
        );
    }

    #[test]
    fn concurrent_auto_acquires_get_distinct_channels() {
        let (dev, _) = emulated_device(0x4000_0000, 8, four_channel_params());
        let dev = Arc::new(dev);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let dev = dev.clone();
                std::thread::spawn(move || {
                    let connector = format!("thread-{i}");
                    dev.acquire(DmaDirection::HostToDev, ChannelReq::Auto, &connector)
                        .map(|(chid, _)| chid)
                })
            })
            .collect();

        let mut chids: Vec<u8> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        chids.sort_unstable();
        assert_eq!(chids, vec![0, 1, 2, 3]);

        // The pool is exhausted now.
        assert_eq!(
            dev.acquire(DmaDirection::HostToDev, ChannelReq::Auto, "late"),
            Err(LldmaError::NoFreeChannel(Bank::Enqueue))
        );
    }

    #[test]
    fn descriptor_queue_flows_through_an_acquired_channel() {
        let (dev, model) = emulated_device(0x4000_0000, 8, four_channel_params());
        let (chid, _) = dev
            .acquire(DmaDirection::HostToDev, ChannelReq::Auto, "queue")
            .unwrap();

        // The ring the hardware was pointed at is the one we post to.
        let programmed = model.channel(Bank::Enqueue, chid);
        assert_ne!(programmed.ring_addr, 0);
        assert_eq!(programmed.ring_size, 255);

        for task_id in 0..10u16 {
            dev.enqueue(
                chid,
                DmaDirection::HostToDev,
                TransferRequest {
                    task_id,
                    op: 1,
                    len: 4096,
                    addr: 0x10_0000 + task_id as u64 * 4096,
                },
            )
            .unwrap();
        }
        // Nothing completed yet.
        assert_eq!(
            dev.dequeue(chid, DmaDirection::HostToDev),
            Err(LldmaError::QueueEmpty)
        );
    }
}
