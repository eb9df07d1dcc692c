// Device model
//
// The numeric device-type codes understood by `/api/devbytype`, the
// cached per-device record, and the reply envelopes for `/api/get`
// and `/api/cmd`.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Device kind codes used by the daemon.
///
/// These are wire constants, sent as the `t` query parameter of
/// `/api/devbytype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceType {
    Serverd = 1,
    Mount = 2,
    Ccd = 3,
    Dome = 4,
    Weather = 5,
    Rotator = 6,
    Photometer = 7,
    Plan = 8,
    Grb = 9,
    Focuser = 10,
    Mirror = 11,
    Cupola = 12,
    FilterWheel = 13,
    AugerShower = 14,
    Sensor = 15,
    Executor = 20,
    ImageProcessor = 21,
    Selector = 22,
    XmlRpc = 23,
    Indi = 24,
    Logd = 25,
    Scriptor = 26,
}

impl DeviceType {
    /// The numeric wire code.
    #[allow(clippy::as_conversions)]
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Last-known state of one device, as stored in the cache.
///
/// `values` holds every reported property as an untyped map; `state`
/// is whatever state value the daemon reported at fetch time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    pub values: Map<String, Value>,
    pub state: Value,
}

/// Reply envelope of `/api/get`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceReply {
    pub d: Map<String, Value>,
    #[serde(default)]
    pub state: Value,
}

impl From<DeviceReply> for Device {
    fn from(reply: DeviceReply) -> Self {
        Self {
            values: reply.d,
            state: reply.state,
        }
    }
}

/// Reply envelope of `/api/cmd` with the extended flag set: the full
/// post-command device state plus the command's return value.
#[derive(Debug, Deserialize)]
pub(crate) struct CommandReply {
    pub d: Map<String, Value>,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub ret: Value,
}
