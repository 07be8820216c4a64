// Copyright (c) 2026 MCU-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Debug state records carried by the pre-launch dump: loaded modules and
//! per-thread register snapshots. Pure codec, no I/O.

use serde::Serialize;

use crate::wire::{DecodeError, WireReader, WireWriter};

pub const GPR_COUNT: usize = 32;

/// Smallest encoding of a module: an empty name.
const MIN_MODULE_SIZE: usize = 8;
/// Smallest encoding of a thread: empty name, 4 scalar fields, GPRs, CRF.
const MIN_THREAD_SIZE: usize = 8 + 4 * 4 + GPR_COUNT * 4 + 4;

/// Capacity to reserve for `count` records read from the remaining payload.
/// Counts come off the wire, so never reserve more records than could fit.
fn bounded_capacity(count: u64, remaining: usize, min_record_size: usize) -> usize {
    count.min((remaining / min_record_size) as u64) as usize
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
}

impl ModuleInfo {
    pub fn read(rdr: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: rdr.read_string("module name")?,
        })
    }

    pub fn write(&self, w: &mut WireWriter) {
        w.put_string(&self.name);
    }
}

/// Register snapshot of a single guest thread.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub name: String,
    /// Core the thread is running on, -1 when not scheduled.
    pub core_id: i32,
    pub attribs: u32,
    pub state: u32,
    pub pc: u32,
    pub gpr: [u32; GPR_COUNT],
    /// Packed condition register.
    pub crf: u32,
}

impl ThreadInfo {
    pub fn read(rdr: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let name = rdr.read_string("thread name")?;
        let core_id = rdr.read_i32("coreId")?;
        let attribs = rdr.read_u32("attribs")?;
        let state = rdr.read_u32("state")?;
        let pc = rdr.read_u32("pc")?;
        let mut gpr = [0u32; GPR_COUNT];
        for reg in gpr.iter_mut() {
            *reg = rdr.read_u32("gpr")?;
        }
        let crf = rdr.read_u32("crf")?;
        Ok(Self {
            name,
            core_id,
            attribs,
            state,
            pc,
            gpr,
            crf,
        })
    }

    pub fn write(&self, w: &mut WireWriter) {
        w.put_string(&self.name);
        w.put_i32(self.core_id);
        w.put_u32(self.attribs);
        w.put_u32(self.state);
        w.put_u32(self.pc);
        for reg in &self.gpr {
            w.put_u32(*reg);
        }
        w.put_u32(self.crf);
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseInfo {
    pub modules: Vec<ModuleInfo>,
    pub threads: Vec<ThreadInfo>,
}

impl PauseInfo {
    pub fn read(rdr: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let module_count = rdr.read_u64("module count")?;
        let mut modules =
            Vec::with_capacity(bounded_capacity(module_count, rdr.remaining(), MIN_MODULE_SIZE));
        for _ in 0..module_count {
            modules.push(ModuleInfo::read(rdr)?);
        }

        let thread_count = rdr.read_u64("thread count")?;
        let mut threads =
            Vec::with_capacity(bounded_capacity(thread_count, rdr.remaining(), MIN_THREAD_SIZE));
        for _ in 0..thread_count {
            threads.push(ThreadInfo::read(rdr)?);
        }

        Ok(Self { modules, threads })
    }

    pub fn write(&self, w: &mut WireWriter) {
        w.put_u64(self.modules.len() as u64);
        for module in &self.modules {
            module.write(w);
        }
        w.put_u64(self.threads.len() as u64);
        for thread in &self.threads {
            thread.write(w);
        }
    }
}

/// Initial state dump sent by the target right after it connects.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PreLaunchPacket {
    pub info: PauseInfo,
}

impl PreLaunchPacket {
    pub fn read(rdr: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            info: PauseInfo::read(rdr)?,
        })
    }

    pub fn write(&self, w: &mut WireWriter) {
        self.info.write(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_thread(name: &str, core_id: i32) -> ThreadInfo {
        let mut gpr = [0u32; GPR_COUNT];
        for (i, reg) in gpr.iter_mut().enumerate() {
            *reg = 0x1000_0000 + i as u32;
        }
        ThreadInfo {
            name: name.to_string(),
            core_id,
            attribs: 0x8,
            state: 2,
            pc: 0x0200_1234,
            gpr,
            crf: 0x2200_0000,
        }
    }

    #[test]
    fn pause_info_roundtrip_preserves_order() {
        let info = PauseInfo {
            modules: vec![
                ModuleInfo { name: "coreinit.rpl".to_string() },
                ModuleInfo { name: "game.rpx".to_string() },
            ],
            threads: vec![sample_thread("Default Core 1", 1), sample_thread("idle", -1)],
        };
        let mut w = WireWriter::new();
        info.write(&mut w);
        let data = w.into_inner();

        let mut rdr = WireReader::new(&data);
        let decoded = PauseInfo::read(&mut rdr).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(rdr.remaining(), 0);
        assert_eq!(decoded.threads[1].core_id, -1);
        assert_eq!(decoded.threads[0].gpr[31], 0x1000_001F);
    }

    #[test]
    fn empty_lists_decode() {
        let data = [0u8; 16];
        let mut rdr = WireReader::new(&data);
        let info = PauseInfo::read(&mut rdr).unwrap();
        assert!(info.modules.is_empty());
        assert!(info.threads.is_empty());
    }

    #[test]
    fn thread_record_size() {
        let mut w = WireWriter::new();
        sample_thread("", 0).write(&mut w);
        // name length + coreId/attribs/state/pc + 32 gprs + crf
        assert_eq!(w.len(), 8 + 4 * 4 + 32 * 4 + 4);
        assert_eq!(w.len(), MIN_THREAD_SIZE);

        let mut w = WireWriter::new();
        ModuleInfo { name: String::new() }.write(&mut w);
        assert_eq!(w.len(), MIN_MODULE_SIZE);
    }

    #[test]
    fn capacity_is_bounded_by_payload_size() {
        // A 64 KiB payload can hold at most 420 empty-named threads.
        assert_eq!(bounded_capacity(u64::MAX, 65_536, MIN_THREAD_SIZE), 420);
        assert_eq!(bounded_capacity(u64::MAX, 65_536, MIN_MODULE_SIZE), 8192);
        assert_eq!(bounded_capacity(3, 65_536, MIN_THREAD_SIZE), 3);
        assert_eq!(bounded_capacity(5, 100, MIN_THREAD_SIZE), 0);
    }

    #[test]
    fn truncated_gpr_array_fails() {
        let mut w = WireWriter::new();
        w.put_u64(0);
        w.put_u64(1);
        sample_thread("main", 0).write(&mut w);
        let mut data = w.into_inner();
        data.truncate(data.len() - 8);

        let mut rdr = WireReader::new(&data);
        let err = PauseInfo::read(&mut rdr).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { what: "gpr", .. }));
    }

    #[test]
    fn module_count_larger_than_payload_fails() {
        let mut w = WireWriter::new();
        w.put_u64(3);
        w.put_string("only-one");
        let data = w.into_inner();
        let mut rdr = WireReader::new(&data);
        assert!(PauseInfo::read(&mut rdr).is_err());
    }
}
