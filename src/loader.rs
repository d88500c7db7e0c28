//! Loads an LE/LX module from disk into a fixup-patched [`Image`] plus a
//! resolved internal-[`FixupMap`] and entry point, the precondition the
//! analysis core requires.
//!
//! Grounded in `exe386::LinearExecutableLayout::get`, generalized: the
//! teacher builds a struct of raw tables for introspection; this loader goes
//! one step further and materializes flat per-object byte buffers with
//! fixups already patched in, the way the original C++ `loader.cpp` does.
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use log::warn;

use crate::core::fixup::FixupMap;
use crate::core::image::{Image, Object as CoreObject};
use crate::error::{Error, Result};
use crate::exe::MzHeader;
use crate::exe386::fpagetab::FixupPageTable;
use crate::exe386::frectab::{FixupRecord, FixupRecordsTable, FixupTarget};
use crate::exe386::header::LinearExecutableHeader;
use crate::exe386::objpagetab::{LEObjectPageHeader, ObjectPage, ObjectPagesTable, PageFlags, LXObjectPageHeader};
use crate::exe386::objtab::{Object as RawObject, ObjectsTable};

pub struct LoadedImage {
    pub image: Image,
    pub fixups: FixupMap,
    pub entry_address: u32,
}

pub struct Loader;

impl Loader {
    pub fn load(path: &str) -> Result<LoadedImage> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let io_err = |source: std::io::Error| Error::Io {
            path: path.to_string(),
            source,
        };

        let base_offset = Self::define_base_offset(&mut reader, path)?;
        reader.seek(SeekFrom::Start(base_offset)).map_err(io_err)?;
        let header = LinearExecutableHeader::read(&mut reader).map_err(io_err)?;

        let offset = |ptr: u32| -> u64 { ptr as u64 + base_offset };

        let object_table = ObjectsTable::read(&mut reader, offset(header.e32_objtab), header.e32_objcnt)
            .map_err(io_err)?;
        let object_pages = ObjectPagesTable::read(
            &mut reader,
            offset(header.e32_objmap),
            header.e32_mpages,
            header.e32_pageshift_or_lastpage,
            header.e32_magic,
        )
        .map_err(io_err)?;

        let data_pages_offset = offset(header.e32_datapage);
        let mut buffers = Self::materialize_objects(&mut reader, &object_table, &object_pages, &header, data_pages_offset)
            .map_err(io_err)?;

        let fixup_page_table =
            FixupPageTable::read(&mut reader, offset(header.e32_fpagetab), &header).map_err(io_err)?;
        let fixup_records =
            FixupRecordsTable::read(&mut reader, &fixup_page_table, offset(header.e32_frectab)).map_err(io_err)?;

        let fixups = Self::resolve_fixups(&fixup_records.records, &object_table.objects, header.e32_pagesize, &mut buffers);

        let image_objects: Vec<CoreObject> = object_table
            .objects
            .iter()
            .zip(buffers.into_iter())
            .enumerate()
            .map(|(index, (raw, data))| CoreObject {
                index: index as u16,
                base_address: raw.virtual_addr,
                executable: raw.is_executable(),
                data,
            })
            .collect();
        let image = Image::new(image_objects);

        let entry_object = header.e32_cs.saturating_sub(1);
        let entry_offset = header.e32_eip;
        let entry_address = object_table
            .objects
            .get(entry_object as usize)
            .map(|o| o.virtual_addr + entry_offset)
            .unwrap_or_else(|| {
                warn!(
                    "entry object index {} out of range ({} objects); defaulting entry address to 0",
                    entry_object,
                    object_table.objects.len()
                );
                0
            });

        Ok(LoadedImage {
            image,
            fixups,
            entry_address,
        })
    }

    fn define_base_offset<T: Read + Seek>(reader: &mut T, path: &str) -> Result<u64> {
        if let Ok(mz) = MzHeader::read(reader) {
            return Ok(mz.e_lfanew as u64);
        }
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|source| Error::Io { path: path.to_string(), source })?;
        LinearExecutableHeader::read(reader)
            .map(|_| 0)
            .map_err(|_| Error::MalformedContainer("neither an MZ stub nor a bare LE/LX header".into()))
    }

    fn materialize_objects<R: Read + Seek>(
        reader: &mut R,
        object_table: &ObjectsTable,
        object_pages: &ObjectPagesTable,
        header: &LinearExecutableHeader,
        data_pages_offset: u64,
    ) -> std::io::Result<Vec<Vec<u8>>> {
        let page_shift = header.e32_pageshift_or_lastpage;
        let page_size = header.e32_pagesize;

        let mut buffers = Vec::with_capacity(object_table.objects.len());
        for obj in &object_table.objects {
            let mut buf = Vec::with_capacity(obj.virtual_size as usize);
            let start = obj.map_index.saturating_sub(1) as usize;
            let count = obj.map_size as usize;
            let slice = object_pages.pages.get(start..start + count).unwrap_or(&[]);

            for page in slice {
                let chunk = Self::read_page(reader, page, page_shift, page_size, data_pages_offset)?;
                buf.extend_from_slice(&chunk);
            }
            buf.resize(obj.virtual_size as usize, 0);
            buffers.push(buf);
        }
        Ok(buffers)
    }

    fn read_page<R: Read + Seek>(
        reader: &mut R,
        page: &ObjectPage,
        page_shift: u32,
        page_size: u32,
        data_pages_offset: u64,
    ) -> std::io::Result<Vec<u8>> {
        match page {
            ObjectPage::LXPageFormat(entry) => {
                let data = LXObjectPageHeader::read_page_data(reader, entry, page_shift, data_pages_offset)?;
                Ok(data.data)
            }
            ObjectPage::LEPageFormat(entry) => Self::read_le_page(reader, entry, page_size, data_pages_offset),
        }
    }

    fn read_le_page<R: Read + Seek>(
        reader: &mut R,
        entry: &LEObjectPageHeader,
        page_size: u32,
        data_pages_offset: u64,
    ) -> std::io::Result<Vec<u8>> {
        let flags = PageFlags::from(entry.flags as u16);
        let page_number =
            entry.page_number[0] as u32 | (entry.page_number[1] as u32) << 8 | (entry.page_number[2] as u32) << 16;

        if flags.is_invalid || page_number == 0 {
            return Ok(vec![0; page_size as usize]);
        }
        if flags.is_iterated {
            warn!("iterated (RLE) LE page {} not decompressed, zero-filling", page_number);
            return Ok(vec![0; page_size as usize]);
        }

        let actual_offset = data_pages_offset + (page_number as u64 - 1) * page_size as u64;
        reader.seek(SeekFrom::Start(actual_offset))?;
        let mut data = vec![0_u8; page_size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Resolves every internal fixup record to an absolute virtual address,
    /// patches it little-endian into the source object's buffer, and records
    /// the resolved `(object, offset) -> target` entry. Imported fixups
    /// (ordinal/name/entry-table targets) are skipped: the core only reasons
    /// about intra-image targets.
    fn resolve_fixups(
        records: &[FixupRecord],
        raw_objects: &[RawObject],
        page_size: u32,
        buffers: &mut [Vec<u8>],
    ) -> FixupMap {
        let mut map = FixupMap::new();

        for record in records {
            let internal = match &record.target_data {
                FixupTarget::Internal(target) => target,
                _ => continue,
            };
            let target_offset = match internal.target_offset {
                Some(off) => off,
                None => continue,
            };
            let target_object_index = internal.object_number.wrapping_sub(1);
            let target_object = match raw_objects.get(target_object_index as usize) {
                Some(o) => o,
                None => {
                    warn!("fixup references out-of-range object {}", internal.object_number);
                    continue;
                }
            };
            let target_address = target_object.virtual_addr + target_offset;

            let source_object = raw_objects.iter().enumerate().find(|(_, o)| {
                let start = o.map_index.saturating_sub(1);
                record.logical_page >= start && record.logical_page < start + o.map_size
            });
            let (src_index, src_obj) = match source_object {
                Some(found) => found,
                None => {
                    warn!("fixup on logical page {} belongs to no object", record.logical_page);
                    continue;
                }
            };

            let within_page_offsets: Vec<u32> = match &record.source_offset_list {
                Some(list) => list.iter().map(|&o| o as u32).collect(),
                None => vec![record.source_offset_or_count as u32],
            };
            let object_page_start = src_obj.map_index.saturating_sub(1);

            for within_page in within_page_offsets {
                let local_offset = (record.logical_page - object_page_start) * page_size + within_page;
                map.insert(src_index as u16, local_offset, target_address);

                if let Some(buf) = buffers.get_mut(src_index) {
                    let start = local_offset as usize;
                    if start + 4 <= buf.len() {
                        buf[start..start + 4].copy_from_slice(&target_address.to_le_bytes());
                    }
                }
            }
        }

        map
    }
}
