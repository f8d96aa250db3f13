// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use liblldma::{LldmaConfig, XpcieDevice};
    use xpcie_hw_model::{LldmaModelEmulated, ModelInitParams};

    pub fn init_logging() {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init()
            .ok();
    }

    /// Device over an emulated model with `pairs` implemented channel
    /// pairs and a no-op drain sleep. Returns the model handle too so
    /// tests can inspect the registers the device programmed.
    pub fn emulated_device(
        base_hw_addr: u64,
        pairs: u8,
        params: ModelInitParams,
    ) -> (XpcieDevice<LldmaModelEmulated>, LldmaModelEmulated) {
        let model = LldmaModelEmulated::new(params);
        let config = LldmaConfig {
            base_hw_addr,
            channel_pairs: pairs,
            ring_depth: 255,
            sleep: |_| {},
            ..Default::default()
        };
        let device = XpcieDevice::new(config, model.clone()).unwrap();
        (device, model)
    }
}

#[cfg(test)]
mod test_channels;
#[cfg(test)]
mod test_d2d;
#[cfg(test)]
mod test_drain;
