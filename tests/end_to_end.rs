//! End-to-end scenarios S1-S6, run directly against the analysis core with
//! hand-built `Image`/`FixupMap` values. No LE/LX file on disk is needed:
//! the loader's only job is producing exactly these two structures.
use ledisasm::core::driver::Driver;
use ledisasm::core::fixup::FixupMap;
use ledisasm::core::image::{Image, Object};
use ledisasm::core::label::LabelType;
use ledisasm::core::region::RegionType;

fn single_object(base: u32, executable: bool, data: Vec<u8>) -> Image {
    Image::new(vec![Object {
        index: 0,
        base_address: base,
        executable,
        data,
    }])
}

// S1 - Minimal: mov eax, 0 ; ret, with a ten-byte unknown tail.
#[test]
fn s1_minimal() {
    let bytes = vec![
        0xB8, 0x00, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ];
    let image = single_object(0x10000, true, bytes);
    let fixups = FixupMap::new();
    let mut driver = Driver::new(&image, &fixups);
    driver.run(0x10000).unwrap();

    let code = driver.regions().region_at(0x10000).unwrap();
    assert_eq!(code.region_type, RegionType::Code);
    assert_eq!(code.address, 0x10000);
    assert_eq!(code.end(), 0x10006);

    let tail = driver.regions().region_at(0x10006).unwrap();
    assert_eq!(tail.region_type, RegionType::Unknown);
    assert_eq!(tail.end(), 0x10010);

    let entry_label = driver.labels().get(0x10000).unwrap();
    assert_eq!(entry_label.label_type, LabelType::Function);
    assert_eq!(entry_label.name.as_deref(), Some("_start"));
}

// S2 - Call discovery: call rel32 into a nop run, then a second ret.
#[test]
fn s2_call_discovery() {
    let bytes = vec![
        0xE8, 0x05, 0x00, 0x00, 0x00, // call +5 -> 0x1000a
        0xC3, // ret
        0x90, 0x90, 0x90, 0x90, // nop * 4
        0xC3, // ret
        0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let image = single_object(0x10000, true, bytes);
    let fixups = FixupMap::new();
    let mut driver = Driver::new(&image, &fixups);
    driver.run(0x10000).unwrap();

    let entry_region = driver.regions().region_at(0x10000).unwrap();
    assert_eq!(entry_region.region_type, RegionType::Code);
    assert_eq!(entry_region.end(), 0x10006);

    let callee_label = driver.labels().get(0x1000a).unwrap();
    assert_eq!(callee_label.label_type, LabelType::Function);

    let callee_region = driver.regions().region_at(0x1000a).unwrap();
    assert_eq!(callee_region.region_type, RegionType::Code);
    assert_eq!(callee_region.address, 0x1000a);
    assert_eq!(callee_region.end(), 0x1000b);
}

// S3 - Vtable via fixups: a pointer elsewhere in the object targets the
// vtable's own address, seeding the sweep; three 4-byte slots there hold
// 0x10040, 0x10050, 0, with the two non-zero slots' source offsets
// themselves recorded as fixup sources (their values are relocated
// pointers too), and a non-zero, non-fixup-source word right after the
// third slot terminates the scan at exactly three slots.
#[test]
fn s3_vtable_via_fixups() {
    let mut data = vec![0u8; 0x100];
    data[0] = 0xC3; // entry: a bare ret
    data[0x40] = 0xC3; // callee at 0x10040
    data[0x50] = 0xC3; // callee at 0x10050
    data[0x20..0x24].copy_from_slice(&0x10040u32.to_le_bytes());
    data[0x24..0x28].copy_from_slice(&0x10050u32.to_le_bytes());
    data[0x28..0x2c].copy_from_slice(&0u32.to_le_bytes());
    data[0x2c] = 0xff; // stops the sweep right after the third slot

    let image = single_object(0x10000, true, data);
    let mut fixups = FixupMap::new();
    fixups.insert(0, 0x04, 0x10020); // a pointer-to-vtable fixup elsewhere
    fixups.insert(0, 0x20, 0x10040);
    fixups.insert(0, 0x24, 0x10050);

    let mut driver = Driver::new(&image, &fixups);
    driver.run(0x10000).unwrap();

    let vtable_region = driver.regions().region_at(0x10020).unwrap();
    assert_eq!(vtable_region.region_type, RegionType::Vtable);
    assert_eq!(vtable_region.size, 12);

    let vtable_label = driver.labels().get(0x10020).unwrap();
    assert_eq!(vtable_label.label_type, LabelType::Vtable);

    assert_eq!(
        driver.labels().get(0x10040).unwrap().label_type,
        LabelType::Function
    );
    assert_eq!(
        driver.labels().get(0x10050).unwrap().label_type,
        LabelType::Function
    );
    assert_eq!(
        driver.regions().region_at(0x10040).unwrap().region_type,
        RegionType::Code
    );
    assert_eq!(
        driver.regions().region_at(0x10050).unwrap().region_type,
        RegionType::Code
    );
}

// S4 - Data object: one non-executable object gets a single DATA region
// and a DATA label at its base, with no entry point inside it.
#[test]
fn s4_data_object() {
    let code_obj = Object {
        index: 0,
        base_address: 0x10000,
        executable: true,
        data: vec![0xC3, 0, 0, 0],
    };
    let data_obj = Object {
        index: 1,
        base_address: 0x20000,
        executable: false,
        data: vec![0u8; 32],
    };
    let image = Image::new(vec![code_obj, data_obj]);
    let fixups = FixupMap::new();
    let mut driver = Driver::new(&image, &fixups);
    driver.run(0x10000).unwrap();

    let region = driver.regions().region_at(0x20000).unwrap();
    assert_eq!(region.region_type, RegionType::Data);
    assert_eq!(region.address, 0x20000);
    assert_eq!(region.size, 32);

    let label = driver.labels().get(0x20000).unwrap();
    assert_eq!(label.label_type, LabelType::Data);
}

// S5 - Guess sweep: entry traces 8 bytes of code then ret; a fixup targets
// an unreferenced address in the unknown remainder, which phase 3 must
// adopt as a guessed function and trace, incrementing the guess counter
// by exactly one.
#[test]
fn s5_guess_sweep() {
    let mut data = vec![0x90u8; 0x20]; // nop sled
    data[7] = 0xC3; // ret at entry+7, closing an 8-byte code run
    data[0x10] = 0xC3; // guessed function body: a bare ret

    let image = single_object(0x10000, true, data);
    let mut fixups = FixupMap::new();
    // a fixup elsewhere in the object whose target is the unreferenced
    // address 0x10010, with a source offset unrelated to the code run.
    fixups.insert(0, 0x18, 0x10010);

    let mut driver = Driver::new(&image, &fixups);
    driver.run(0x10000).unwrap();

    assert_eq!(driver.guess_count(), 1);

    let guessed_label = driver.labels().get(0x10010).unwrap();
    assert_eq!(guessed_label.label_type, LabelType::Function);

    let guessed_region = driver.regions().region_at(0x10010).unwrap();
    assert_eq!(guessed_region.region_type, RegionType::Code);
}

// S6 - Stickiness: a named FUNCTION label resists a weaker JUMP guess at
// the same address.
#[test]
fn s6_stickiness() {
    use ledisasm::core::label::{Label, LabelMap};

    let mut labels = LabelMap::new();
    labels.set(Label::named(0x1000, LabelType::Function, "_start"));
    labels.set(Label::new(0x1000, LabelType::Jump));

    let label = labels.get(0x1000).unwrap();
    assert_eq!(label.label_type, LabelType::Function);
    assert_eq!(label.name.as_deref(), Some("_start"));
}
