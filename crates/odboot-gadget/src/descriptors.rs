//! FunctionFS descriptor and string blobs written to `ep0` before binding.
//!
//! Layouts follow `linux/usb/functionfs.h` and `linux/usb/ch9.h`; every
//! multi-byte field is little-endian on the wire.

pub const FUNCTIONFS_DESCRIPTORS_MAGIC_V2: u32 = 3;
pub const FUNCTIONFS_STRINGS_MAGIC: u32 = 2;

pub const FUNCTIONFS_HAS_FS_DESC: u32 = 1;
pub const FUNCTIONFS_HAS_HS_DESC: u32 = 2;
pub const FUNCTIONFS_HAS_SS_DESC: u32 = 4;

const USB_DT_INTERFACE: u8 = 0x04;
const USB_DT_ENDPOINT: u8 = 0x05;
const USB_DT_SS_ENDPOINT_COMP: u8 = 0x30;
const USB_CLASS_COMM: u8 = 0x02;
const USB_DIR_OUT: u8 = 0x00;
const USB_ENDPOINT_XFER_BULK: u8 = 0x02;

pub const USB_DT_INTERFACE_SIZE: u8 = 9;
/// `usb_endpoint_descriptor_no_audio`
pub const USB_DT_ENDPOINT_SIZE: u8 = 7;
pub const USB_DT_SS_EP_COMP_SIZE: u8 = 6;

/// Full, high and super speed bulk packet sizes.
pub const MAX_PACKET_SIZES: [u16; 3] = [64, 512, 1024];
pub const FUNCTION_NAME: &str = "ODBOOT";
pub const LANG_EN_US: u16 = 0x0409;

const HEADER_SIZE: usize = 24;
const STRINGS_HEADER_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InterfaceDescriptor {
    number: u8,
    num_endpoints: u8,
    class: u8,
    string_index: u8,
}

impl InterfaceDescriptor {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            USB_DT_INTERFACE_SIZE,
            USB_DT_INTERFACE,
            self.number,
            0, // bAlternateSetting
            self.num_endpoints,
            self.class,
            0, // bInterfaceSubClass
            0, // bInterfaceProtocol
            self.string_index,
        ]);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EndpointDescriptor {
    address: u8,
    attributes: u8,
    max_packet_size: u16,
}

impl EndpointDescriptor {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            USB_DT_ENDPOINT_SIZE,
            USB_DT_ENDPOINT,
            self.address,
            self.attributes,
        ]);
        out.extend_from_slice(&self.max_packet_size.to_le_bytes());
        out.push(0); // bInterval
    }
}

fn encode_ss_companion(out: &mut Vec<u8>) {
    out.extend_from_slice(&[USB_DT_SS_EP_COMP_SIZE, USB_DT_SS_ENDPOINT_COMP, 0, 0]);
    out.extend_from_slice(&0u16.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// One interface with a single bulk OUT endpoint at every speed, plus the
/// SuperSpeed companion.
pub fn descriptors() -> Vec<u8> {
    let per_speed = usize::from(USB_DT_INTERFACE_SIZE) + usize::from(USB_DT_ENDPOINT_SIZE);
    let length = HEADER_SIZE + MAX_PACKET_SIZES.len() * per_speed + usize::from(USB_DT_SS_EP_COMP_SIZE);

    let mut out = Vec::with_capacity(length);
    put_u32(&mut out, FUNCTIONFS_DESCRIPTORS_MAGIC_V2);
    put_u32(&mut out, length as u32);
    put_u32(
        &mut out,
        FUNCTIONFS_HAS_FS_DESC | FUNCTIONFS_HAS_HS_DESC | FUNCTIONFS_HAS_SS_DESC,
    );
    put_u32(&mut out, 2); // fs_count
    put_u32(&mut out, 2); // hs_count
    put_u32(&mut out, 3); // ss_count

    let interface = InterfaceDescriptor {
        number: 0,
        num_endpoints: 1,
        class: USB_CLASS_COMM,
        string_index: 1,
    };
    for (speed, max_packet_size) in MAX_PACKET_SIZES.into_iter().enumerate() {
        interface.encode(&mut out);
        EndpointDescriptor {
            address: 1 | USB_DIR_OUT,
            attributes: USB_ENDPOINT_XFER_BULK,
            max_packet_size,
        }
        .encode(&mut out);
        if speed == 2 {
            encode_ss_companion(&mut out);
        }
    }
    debug_assert_eq!(out.len(), length);
    out
}

/// A single en-US string naming the function.
pub fn strings() -> Vec<u8> {
    let length = STRINGS_HEADER_SIZE + 2 + FUNCTION_NAME.len() + 1;

    let mut out = Vec::with_capacity(length);
    put_u32(&mut out, FUNCTIONFS_STRINGS_MAGIC);
    put_u32(&mut out, length as u32);
    put_u32(&mut out, 1); // str_count
    put_u32(&mut out, 1); // lang_count
    out.extend_from_slice(&LANG_EN_US.to_le_bytes());
    out.extend_from_slice(FUNCTION_NAME.as_bytes());
    out.push(0);
    debug_assert_eq!(out.len(), length);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_blob_matches_kernel_layout() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x03, 0x00, 0x00, 0x00, // magic v2
            0x4e, 0x00, 0x00, 0x00, // length 78
            0x07, 0x00, 0x00, 0x00, // FS | HS | SS
            0x02, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            // full speed
            0x09, 0x04, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x01,
            0x07, 0x05, 0x01, 0x02, 0x40, 0x00, 0x00,
            // high speed
            0x09, 0x04, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x01,
            0x07, 0x05, 0x01, 0x02, 0x00, 0x02, 0x00,
            // super speed
            0x09, 0x04, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x01,
            0x07, 0x05, 0x01, 0x02, 0x00, 0x04, 0x00,
            0x06, 0x30, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(descriptors(), expected);
    }

    #[test]
    fn strings_blob_matches_kernel_layout() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x02, 0x00, 0x00, 0x00, // magic
            0x19, 0x00, 0x00, 0x00, // length 25
            0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x09, 0x04,
            b'O', b'D', b'B', b'O', b'O', b'T', 0x00,
        ];
        assert_eq!(strings(), expected);
    }
}
