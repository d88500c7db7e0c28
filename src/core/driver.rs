//! Three-phase fixed-point analysis: entry-point trace, vtable sweep,
//! remaining-fixup sweep.
//!
//! Grounded in `analyser.cpp`'s `Analyser::run`/`trace_code`/`trace_vtables`/
//! `trace_remaining_relocs`.
use std::collections::VecDeque;

use log::warn;

use crate::core::decoder::{self, InstructionClass};
use crate::core::fixup::FixupMap;
use crate::core::image::Image;
use crate::core::label::{Label, LabelMap, LabelType};
use crate::core::region::{Region, RegionMap, RegionType};
use crate::error::{Error, Result};

pub struct Driver<'a> {
    image: &'a Image,
    fixups: &'a FixupMap,
    regions: RegionMap,
    labels: LabelMap,
    queue: VecDeque<u32>,
    guesses: u32,
}

impl<'a> Driver<'a> {
    pub fn new(image: &'a Image, fixups: &'a FixupMap) -> Self {
        let mut regions = RegionMap::new();
        let mut labels = LabelMap::new();

        for obj in image.objects() {
            let region_type = if obj.executable {
                RegionType::Unknown
            } else {
                RegionType::Data
            };
            regions.add_initial(Region::new(obj.base_address, obj.data.len() as u32, region_type));
            if !obj.executable {
                labels.set(Label::new(obj.base_address, LabelType::Data));
            }
        }

        Self {
            image,
            fixups,
            regions,
            labels,
            queue: VecDeque::new(),
            guesses: 0,
        }
    }

    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn guess_count(&self) -> u32 {
        self.guesses
    }

    /// Runs all three phases in order, seeded from `entry_address`. Aborts
    /// with `Error::Decode` the instant the decoder hits an opcode it cannot
    /// size — a fatal condition, not a per-address anomaly.
    pub fn run(&mut self, entry_address: u32) -> Result<()> {
        self.labels
            .set(Label::named(entry_address, LabelType::Function, "_start"));
        self.queue.push_back(entry_address);

        self.trace_code()?;
        self.trace_vtables()?;
        self.trace_remaining_relocs()?;
        Ok(())
    }

    /// Phase 1: drains the work queue, walking each address as a code run.
    fn trace_code(&mut self) -> Result<()> {
        while let Some(addr) = self.queue.pop_front() {
            self.trace_code_at_address(addr)?;
        }
        Ok(())
    }

    fn trace_code_at_address(&mut self, start: u32) -> Result<()> {
        let region = match self.regions.region_at(start) {
            Some(r) => *r,
            None => {
                warn!("trace_code: address 0x{:x} is not in any mapped region", start);
                return Ok(());
            }
        };
        if region.region_type == RegionType::Code {
            return Ok(());
        }

        let mut addr = start;
        loop {
            if addr >= region.end() {
                break;
            }
            let bytes = match self.image.bytes_from(addr) {
                Some(b) => b,
                None => {
                    warn!("trace_code: address 0x{:x} has no backing object bytes", addr);
                    break;
                }
            };
            let decoded = match decoder::decode(addr, bytes) {
                Ok(d) => d,
                Err(source) => return Err(Error::Decode { addr, source }),
            };
            if decoded.size == 0 {
                warn!("trace_code: could not decode instruction at 0x{:x}, stopping walk", addr);
                break;
            }

            if decoded.target != 0 {
                match decoded.class {
                    InstructionClass::Call => {
                        self.labels.set(Label::new(decoded.target, LabelType::Function));
                        self.queue.push_back(decoded.target);
                    }
                    InstructionClass::CondJump | InstructionClass::Jump => {
                        self.labels.set(Label::new(decoded.target, LabelType::Jump));
                        self.queue.push_back(decoded.target);
                    }
                    InstructionClass::Misc | InstructionClass::Ret => {}
                }
            }

            let next = addr + decoded.size as u32;
            let stop = matches!(decoded.class, InstructionClass::Jump | InstructionClass::Ret);
            addr = next;
            if stop {
                break;
            }
        }

        if addr > start {
            self.regions.insert(Region::new(start, addr - start, RegionType::Code));
        }
        Ok(())
    }

    /// Phase 2: scans every internal fixup target for a plausible vtable —
    /// a run of non-zero function pointers (or zero slots) in an UNKNOWN
    /// region of an executable object.
    fn trace_vtables(&mut self) -> Result<()> {
        for obj in self.image.objects() {
            if !obj.executable {
                continue;
            }
            let targets: Vec<u32> = self
                .fixups
                .offsets_in(obj.index)
                .map(|(_, target)| target)
                .collect();

            for &target in &targets {
                self.trace_vtable_at(target);
                self.trace_code()?;
            }
        }
        Ok(())
    }

    fn trace_vtable_at(&mut self, target: u32) {
        let region = match self.regions.region_at(target) {
            Some(r) => *r,
            None => return,
        };
        if region.region_type != RegionType::Unknown {
            return;
        }
        let obj = match self.image.object_containing(target) {
            Some(o) => o,
            None => return,
        };
        let obj_index = obj.index;
        let obj_base = obj.base_address;

        let next_fixup = self
            .fixups
            .targets()
            .filter(|&t| t > target)
            .min()
            .unwrap_or(u32::MAX);
        let extent_end = region.end().min(next_fixup);

        let mut count = 0u32;
        let mut addr = target;
        while addr + 4 <= extent_end {
            let word = match self.image.bytes_at(addr, 4) {
                Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                None => break,
            };
            let source_offset = addr - obj_base;
            let is_recorded_fixup_source = self.fixups.target_at(obj_index, source_offset).is_some();

            if word != 0 && !is_recorded_fixup_source {
                break;
            }

            if word != 0 {
                self.labels.set(Label::new(word, LabelType::Function));
                self.queue.push_back(word);
            }
            count += 1;
            addr += 4;
        }

        if count > 0 {
            self.regions
                .insert(Region::new(target, count * 4, RegionType::Vtable));
            self.labels.set(Label::new(target, LabelType::Vtable));
        }
    }

    /// Phase 3: any fixup target not already claimed by CODE or VTABLE
    /// becomes either a guessed function (UNKNOWN destination) or a DATA
    /// label (DATA destination). Visits fixups per object, in ascending
    /// source-offset order, objects in ascending index order — the same
    /// traversal phase 2 uses — rather than the deduplicated, address-sorted
    /// target set, since an UNKNOWN region can be claimed by `trace_code`
    /// triggered from one target before another is visited, making
    /// traversal order observable in the final region/guess outcome.
    fn trace_remaining_relocs(&mut self) -> Result<()> {
        for obj in self.image.objects() {
            let targets: Vec<u32> = self.fixups.offsets_in(obj.index).map(|(_, target)| target).collect();
            for target in targets {
                let region = match self.regions.region_at(target) {
                    Some(r) => *r,
                    None => continue,
                };
                match region.region_type {
                    RegionType::Code | RegionType::Vtable => continue,
                    RegionType::Unknown => {
                        let already_targeted = matches!(
                            self.labels.get(target).map(|l| l.label_type),
                            Some(LabelType::Function) | Some(LabelType::Jump)
                        );
                        if !already_targeted {
                            self.guesses += 1;
                            self.labels.set(Label::new(target, LabelType::Function));
                        }
                        self.queue.push_back(target);
                        self.trace_code()?;
                    }
                    RegionType::Data => {
                        self.labels.set(Label::new(target, LabelType::Data));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::Object;

    fn image_with(bytes: Vec<u8>) -> Image {
        Image::new(vec![Object {
            index: 0,
            base_address: 0x10000,
            executable: true,
            data: bytes,
        }])
    }

    // S1: mov eax, 0 ; ret
    #[test]
    fn s1_entry_trace_labels_and_types_a_single_function() {
        let bytes = vec![
            0xB8, 0x00, 0x00, 0x00, 0x00, // mov eax, 0
            0xC3, // ret
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let image = image_with(bytes);
        let fixups = FixupMap::new();
        let mut driver = Driver::new(&image, &fixups);
        driver.run(0x10000).unwrap();

        let region = driver.regions().region_at(0x10000).unwrap();
        assert_eq!(region.region_type, RegionType::Code);
        assert_eq!(region.size, 6);
        let label = driver.labels().get(0x10000).unwrap();
        assert_eq!(label.label_type, LabelType::Function);
        assert_eq!(label.name.as_deref(), Some("_start"));
    }

    // S2: call +5 ; ret ; nop*4 ; ret ; ...
    #[test]
    fn s2_call_target_is_traced_and_labeled_function() {
        let bytes = vec![
            0xE8, 0x05, 0x00, 0x00, 0x00, // call rel32 -> 0x1000a
            0xC3, // ret
            0x90, 0x90, 0x90, 0x90, // nop*4
            0xC3, // ret
            0, 0, 0, 0, 0,
        ];
        let image = image_with(bytes);
        let fixups = FixupMap::new();
        let mut driver = Driver::new(&image, &fixups);
        driver.run(0x10000).unwrap();

        let call_label = driver.labels().get(0x1000a).unwrap();
        assert_eq!(call_label.label_type, LabelType::Function);

        let callee_region = driver.regions().region_at(0x1000a).unwrap();
        assert_eq!(callee_region.region_type, RegionType::Code);
    }

    #[test]
    fn trace_at_unmapped_address_warns_and_does_not_panic() {
        let image = image_with(vec![0xC3; 4]);
        let fixups = FixupMap::new();
        let mut driver = Driver::new(&image, &fixups);
        driver.run(0xdead0000).unwrap();
        assert!(driver.regions().region_at(0xdead0000).is_none());
    }

    #[test]
    fn remaining_relocs_label_data_destinations_as_data() {
        let image = Image::new(vec![
            Object {
                index: 0,
                base_address: 0x10000,
                executable: true,
                data: vec![0xC3, 0, 0, 0],
            },
            Object {
                index: 1,
                base_address: 0x20000,
                executable: false,
                data: vec![0; 0x10],
            },
        ]);
        let mut fixups = FixupMap::new();
        fixups.insert(0, 0, 0x20004);
        let mut driver = Driver::new(&image, &fixups);
        driver.run(0x10000).unwrap();

        let label = driver.labels().get(0x20004).unwrap();
        assert_eq!(label.label_type, LabelType::Data);
    }
}
