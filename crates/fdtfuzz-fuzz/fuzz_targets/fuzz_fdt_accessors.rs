#![no_main]
use fdtfuzz_core::{Fdt, NodeOffset, PropOffset};
use libfuzzer_sys::fuzz_target;

// Every accessor must return, not panic, on blobs that fail validation too.
fuzz_target!(|data: &[u8]| {
    let fdt = Fdt::new(data);
    let _ = fdt.check_full();

    for node in fdt.nodes().take(256) {
        let _ = fdt.name_bytes(node);
        let _ = fdt.node_depth(node);
        let phandle = fdt.get_phandle(node);
        let _ = fdt.node_offset_by_phandle(phandle);
        for prop in fdt.properties(node).take(256) {
            let _ = fdt.property_name(prop);
            let _ = fdt.property_value(prop);
        }
    }

    // Probe offsets taken from the input itself.
    for chunk in data.chunks_exact(4).take(64) {
        let offset = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        let _ = fdt.first_subnode(NodeOffset(offset));
        let _ = fdt.next_subnode(NodeOffset(offset));
        let _ = fdt.first_property_offset(NodeOffset(offset));
        let _ = fdt.next_property_offset(PropOffset(offset));
        let _ = fdt.property_by_offset(PropOffset(offset));
    }
});
