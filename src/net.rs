// Rickshaw Passenger Unit — WiFi Link
//
// Blocking station-mode association with a bounded retry budget. The unit
// is deliberately unresponsive while this runs; the budget caps how long.

use std::thread;
use std::time::Duration;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

use crate::config::{CONNECT_RETRY_STEP_MS, WIFI_CONNECT_RETRIES, WIFI_PASSWORD, WIFI_SSID};
use crate::link::LinkError;

pub struct WifiLink {
    wifi: EspWifi<'static>,
}

impl WifiLink {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let mut wifi = EspWifi::new(modem, sys_loop, Some(nvs))?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: WIFI_SSID
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID longer than 32 bytes"))?,
            password: WIFI_PASSWORD
                .try_into()
                .map_err(|_| anyhow::anyhow!("WiFi password longer than 64 bytes"))?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        }))?;

        Ok(Self { wifi })
    }

    /// Associate and wait for an IP, polling in 500 ms steps up to the
    /// retry budget (~10 s). On timeout the association attempt is torn
    /// down so the next call starts clean.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        log::info!("Connecting to WiFi \"{}\"…", WIFI_SSID);

        let started = self.wifi.start().and_then(|_| self.wifi.connect());
        if let Err(e) = started {
            log::warn!("WiFi association failed to start: {}", e);
            self.disconnect();
            return Err(LinkError::WifiTimeout);
        }

        for _ in 0..WIFI_CONNECT_RETRIES {
            if self.has_ip() {
                match self.wifi.sta_netif().get_ip_info() {
                    Ok(info) => log::info!("WiFi connected, IP {}", info.ip),
                    Err(_) => log::info!("WiFi connected"),
                }
                return Ok(());
            }
            thread::sleep(Duration::from_millis(CONNECT_RETRY_STEP_MS));
        }

        log::warn!("WiFi connect timed out after {} retries", WIFI_CONNECT_RETRIES);
        self.disconnect();
        Err(LinkError::WifiTimeout)
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn has_ip(&self) -> bool {
        self.is_connected()
            && self
                .wifi
                .sta_netif()
                .get_ip_info()
                .map(|info| !info.ip.is_unspecified())
                .unwrap_or(false)
    }

    /// Best-effort teardown; errors here only mean there was nothing up.
    pub fn disconnect(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }
}
