use crate::device::{DeviceId, INGENIC_VENDOR_ID};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Board {
    pub name: &'static str,
    /// Basename of the device tree blob shipped for this board.
    pub devicetree: &'static str,
    /// Selects the `ubiboot-<variant>.bin` stage-1 loader.
    pub bootloader: &'static str,
    pub description: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardGroup {
    pub codename: &'static str,
    pub device: DeviceId,
    pub boards: &'static [Board],
}

pub const BOARD_GROUPS: &[BoardGroup] = &[
    BoardGroup {
        codename: "lepus",
        device: DeviceId::new(INGENIC_VENDOR_ID, 0x4740),
        boards: &[
            Board {
                name: "rs90",
                devicetree: "rs90",
                bootloader: "rs90",
                description: "RS-90",
            },
            Board {
                name: "rg99",
                devicetree: "rg99",
                bootloader: "rs90",
                description: "Anbernic RG-99",
            },
        ],
    },
    BoardGroup {
        codename: "gcw0",
        device: DeviceId::new(INGENIC_VENDOR_ID, 0x4770),
        boards: &[
            Board {
                name: "gcw0",
                devicetree: "gcw0",
                bootloader: "gcw0",
                description: "GCW Zero",
            },
            Board {
                name: "pocketgo2v2",
                devicetree: "pocketgo2v2",
                bootloader: "pocketgo2v2",
                description: "MooreChip PocketGo2 v2",
            },
            Board {
                name: "rg280v",
                devicetree: "rg280v",
                bootloader: "rg350",
                description: "Anbernic RG-280V",
            },
            Board {
                name: "rg280m",
                devicetree: "rg280m",
                bootloader: "rg350",
                description: "Anbernic RG-280M",
            },
            Board {
                name: "rg350",
                devicetree: "rg350",
                bootloader: "rg350",
                description: "Anbernic RG-350",
            },
            Board {
                name: "rg350m",
                devicetree: "rg350m",
                bootloader: "rg350",
                description: "Anbernic RG-350M",
            },
            Board {
                name: "rg300x",
                devicetree: "rg300x",
                bootloader: "rg350",
                description: "Anbernic RG-300X",
            },
        ],
    },
];

pub fn groups_for_device(device: DeviceId) -> impl Iterator<Item = &'static BoardGroup> {
    BOARD_GROUPS
        .iter()
        .filter(move |group| group.device == device)
}

/// Boards that can be booted on a device presenting `device`.
pub fn boards_for_device(device: DeviceId) -> Vec<&'static Board> {
    groups_for_device(device)
        .flat_map(|group| group.boards.iter())
        .collect()
}

pub fn find_board(name: &str) -> Option<(&'static BoardGroup, &'static Board)> {
    BOARD_GROUPS.iter().find_map(|group| {
        group
            .boards
            .iter()
            .find(|board| board.name.eq_ignore_ascii_case(name))
            .map(|board| (group, board))
    })
}
