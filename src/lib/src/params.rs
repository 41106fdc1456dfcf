//! Well-known configuration parameter and item names

pub const ENDPOINT_NAME: &[u8] = b"mbed.EndpointName";
pub const USE_BOOTSTRAP: &[u8] = b"mbed.UseBootstrap";
pub const FIRST_TO_CLAIM: &[u8] = b"mbed.FirstToClaim";

pub const MANUFACTURER: &[u8] = b"mbed.Manufacturer";
pub const MODEL_NUMBER: &[u8] = b"mbed.ModelNumber";
pub const DEVICE_TYPE: &[u8] = b"mbed.DeviceType";
pub const HARDWARE_VERSION: &[u8] = b"mbed.HardwareVersion";
pub const MEMORY_TOTAL_KB: &[u8] = b"mbed.MemoryTotalKB";
pub const SERIAL_NUMBER: &[u8] = b"mbed.SerialNumber";

/// Device metadata every configured device must carry
pub const REQUIRED_METADATA: [&[u8]; 6] = [
    MANUFACTURER,
    MODEL_NUMBER,
    DEVICE_TYPE,
    HARDWARE_VERSION,
    MEMORY_TOTAL_KB,
    SERIAL_NUMBER,
];

pub const BOOTSTRAP_SERVER_CA_CERT: &[u8] = b"mbed.BootstrapServerCACert";
pub const BOOTSTRAP_SERVER_URI: &[u8] = b"mbed.BootstrapServerURI";
pub const BOOTSTRAP_DEVICE_PRIVATE_KEY: &[u8] = b"mbed.BootstrapDevicePrivateKey";
pub const BOOTSTRAP_DEVICE_CERT: &[u8] = b"mbed.BootstrapDeviceCert";

pub const LWM2M_SERVER_CA_CERT: &[u8] = b"mbed.LwM2MServerCACert";
pub const LWM2M_SERVER_URI: &[u8] = b"mbed.LwM2MServerURI";
pub const LWM2M_DEVICE_PRIVATE_KEY: &[u8] = b"mbed.LwM2MDevicePrivateKey";
pub const LWM2M_DEVICE_CERT: &[u8] = b"mbed.LwM2MDeviceCert";

pub const UPDATE_AUTH_CERT: &[u8] = b"mbed.UpdateAuthCert";

pub const CURRENT_TIME: &[u8] = b"mbed.CurrentTime";
pub const TIMEZONE: &[u8] = b"mbed.Timezone";
pub const UTC_OFFSET: &[u8] = b"mbed.UTCOffset";

/// Names of the security objects used by one connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityObjectNames {
    pub server_ca_cert: &'static [u8],
    pub server_uri: &'static [u8],
    pub device_private_key: &'static [u8],
    pub device_cert: &'static [u8],
}

pub const BOOTSTRAP_OBJECTS: SecurityObjectNames = SecurityObjectNames {
    server_ca_cert: BOOTSTRAP_SERVER_CA_CERT,
    server_uri: BOOTSTRAP_SERVER_URI,
    device_private_key: BOOTSTRAP_DEVICE_PRIVATE_KEY,
    device_cert: BOOTSTRAP_DEVICE_CERT,
};

pub const LWM2M_OBJECTS: SecurityObjectNames = SecurityObjectNames {
    server_ca_cert: LWM2M_SERVER_CA_CERT,
    server_uri: LWM2M_SERVER_URI,
    device_private_key: LWM2M_DEVICE_PRIVATE_KEY,
    device_cert: LWM2M_DEVICE_CERT,
};
