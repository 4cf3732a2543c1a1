// Rickshaw Passenger Unit — LDR Light Sensor
//
// Raw oneshot ADC read of the light-dependent resistor divider on GPIO34
// (ADC1 channel 6). Raw ESP-IDF calls; the acceptance band in config is in
// the same raw 12-bit counts.

pub struct LightSensor {
    handle: esp_idf_sys::adc_oneshot_unit_handle_t,
    channel: esp_idf_sys::adc_channel_t,
}

impl LightSensor {
    pub fn new() -> anyhow::Result<Self> {
        // GPIO34 / ADC1_CHANNEL_6, 11 dB attenuation (0–3.3 V range).
        unsafe {
            let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            let ret = esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle);
            if ret != esp_idf_sys::ESP_OK {
                anyhow::bail!("ADC unit init failed ({})", ret);
            }

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let channel = esp_idf_sys::adc_channel_t_ADC_CHANNEL_6;
            let ret = esp_idf_sys::adc_oneshot_config_channel(handle, channel, &chan_cfg);
            if ret != esp_idf_sys::ESP_OK {
                anyhow::bail!("ADC channel config failed ({})", ret);
            }

            Ok(Self { handle, channel })
        }
    }

    /// Raw 12-bit reading. A failed read logs and returns 0, which can
    /// never fall in the acceptance band.
    pub fn read_raw(&self) -> u16 {
        let mut raw: i32 = 0;
        let ret = unsafe { esp_idf_sys::adc_oneshot_read(self.handle, self.channel, &mut raw) };
        if ret != esp_idf_sys::ESP_OK {
            log::warn!("LDR read failed ({})", ret);
            return 0;
        }
        raw.clamp(0, 4095) as u16
    }
}
