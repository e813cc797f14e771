use core::fmt;

pub const INGENIC_VENDOR_ID: u16 = 0x601a;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// One boot-ROM personality and where its two stages are loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocFamily {
    pub id: DeviceId,
    pub label: &'static str,
    pub stage1_load_addr: u32,
    pub stage2_load_addr: u32,
}

pub const SOC_FAMILIES: &[SocFamily] = &[
    SocFamily {
        id: DeviceId::new(INGENIC_VENDOR_ID, 0x4740),
        label: "JZ4740",
        stage1_load_addr: 0x8000_2000,
        stage2_load_addr: 0x8100_0000,
    },
    SocFamily {
        id: DeviceId::new(INGENIC_VENDOR_ID, 0x4750),
        label: "JZ4750",
        stage1_load_addr: 0x8000_2000,
        stage2_load_addr: 0x8100_0000,
    },
    SocFamily {
        id: DeviceId::new(INGENIC_VENDOR_ID, 0x4770),
        label: "JZ4770",
        stage1_load_addr: 0xf400_0800,
        stage2_load_addr: 0x8100_0000,
    },
    SocFamily {
        id: DeviceId::new(INGENIC_VENDOR_ID, 0x4780),
        label: "JZ4780",
        stage1_load_addr: 0xf400_0a00,
        stage2_load_addr: 0x8100_0000,
    },
];

pub fn known_device_ids() -> Vec<DeviceId> {
    SOC_FAMILIES.iter().map(|soc| soc.id).collect()
}

pub fn soc_family(id: DeviceId) -> Option<&'static SocFamily> {
    SOC_FAMILIES.iter().find(|soc| soc.id == id)
}

pub fn soc_label(id: DeviceId) -> &'static str {
    soc_family(id).map(|soc| soc.label).unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_family() {
        for soc in SOC_FAMILIES {
            assert_eq!(soc_label(soc.id), soc.label);
            assert_eq!(soc.id.vendor_id, INGENIC_VENDOR_ID);
        }
        assert_eq!(soc_label(DeviceId::new(0x1234, 0x5678)), "unknown");
    }

    #[test]
    fn device_id_displays_as_vid_pid() {
        assert_eq!(DeviceId::new(0x601a, 0x4770).to_string(), "601a:4770");
    }
}
