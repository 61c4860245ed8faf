// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Checks the forward-only merge against a plain reference, over generated
//! tables and override lists.

use drv_ddr_api::{DramCfgParam, DramTimingInfo, FspMsg, FwType};
use drv_i2c_api::mock::{MockBus, MockDevice};
use drv_var_eeprom::adjust::{
    Adjustment, Merge, ROW_SIZE, ReadFailurePolicy, adjust_dram,
};
use drv_var_eeprom::som::SomRecord;
use drv_var_eeprom::{Eeprom, NoCache};
use proptest::prelude::*;
use proptest::sample::Index;
use zerocopy::FromZeros;

const BASE: usize = 64;
const MAX_ROWS: usize = 20;

/// Override rows live from `BASE` on; `off[0]` and `off[1]` must fit in a
/// byte.
const _: () = assert!(BASE + MAX_ROWS * ROW_SIZE <= u8::MAX as usize);

/// Reference model: scan from where the last match was, and once a row fails
/// to match, nothing else in the table does.
fn reference(
    base: &[DramCfgParam],
    rows: &[DramCfgParam],
) -> (Vec<DramCfgParam>, usize) {
    let mut out = base.to_vec();
    let mut from = Some(0);
    let mut matched = 0;
    for row in rows {
        let Some(start) = from else { continue };
        match out[start..].iter().position(|e| e.reg == row.reg) {
            Some(i) => {
                out[start + i].val = row.val;
                from = Some(start + i);
                matched += 1;
            }
            None => from = None,
        }
    }
    (out, matched)
}

fn base_table() -> impl Strategy<Value = Vec<DramCfgParam>> {
    prop::collection::btree_set(1u32..0x400, 1..24).prop_flat_map(|regs| {
        let n = regs.len();
        prop::collection::vec(any::<u32>(), n).prop_map(move |vals| {
            regs.iter()
                .zip(vals)
                .map(|(&reg, val)| DramCfgParam::new(reg, val))
                .collect()
        })
    })
}

/// Overrides that hit the base table in order, with repeats allowed.
fn in_order(
    base: &[DramCfgParam],
    picks: Vec<(Index, u32)>,
) -> Vec<DramCfgParam> {
    let mut picks: Vec<_> = picks
        .into_iter()
        .map(|(ix, val)| (ix.index(base.len()), val))
        .collect();
    picks.sort_by_key(|&(i, _)| i);
    picks
        .into_iter()
        .map(|(i, val)| DramCfgParam::new(base[i].reg, val))
        .collect()
}

/// Runs `rows` through `adjust_dram` as the DDRC adjustment table, returning
/// the patched table, matched count and number of bus reads.
fn through_eeprom(
    base: &[DramCfgParam],
    rows: &[DramCfgParam],
) -> (Vec<DramCfgParam>, u16, usize) {
    let mut image = [0u8; 256];
    for (i, row) in rows.iter().enumerate() {
        let at = BASE + i * ROW_SIZE;
        image[at..at + 4].copy_from_slice(&row.reg.to_le_bytes());
        image[at + 4..at + 8].copy_from_slice(&row.val.to_le_bytes());
    }

    let mut record = SomRecord::new_zeroed();
    record.version = 2;
    record.off[0] = BASE as u8;
    record.off[1] = (BASE + rows.len() * ROW_SIZE) as u8;

    let devs = [MockDevice {
        bus: "i2c0",
        address: 0x52,
        image: &image,
    }];
    let bus = MockBus::new(&["i2c0"], &devs);
    let eeprom = Eeprom::probe(&bus, "i2c0", 0x52, NoCache).unwrap();

    let mut ddrc = base.to_vec();
    let mut empty: [DramCfgParam; 0] = [];
    let mut phy: [DramCfgParam; 0] = [];
    let mut pie: [DramCfgParam; 0] = [];
    let mut fsp0: [DramCfgParam; 0] = [];
    let mut fsp = [FspMsg {
        drate: 0,
        fw_type: FwType::OneD,
        fsp_cfg: &mut fsp0,
    }];
    let mut timing = DramTimingInfo {
        ddrc_cfg: &mut ddrc,
        ddrphy_cfg: &mut phy,
        fsp_msg: &mut fsp,
        ddrphy_trained_csr: &mut empty,
        ddrphy_pie: &mut pie,
        fsp_table: [0; 4],
    };

    let trusted = |_: &SomRecord| true;
    let result = adjust_dram(
        &eeprom,
        &record,
        &trusted,
        &mut timing,
        ReadFailurePolicy::Abort,
    );
    let matched = match result {
        Ok(Adjustment::Applied(report)) => report.tables[0].matched,
        other => panic!("unexpected outcome {other:?}"),
    };
    (timing.ddrc_cfg.to_vec(), matched, bus.reads())
}

proptest! {
    #[test]
    fn sorted_overrides_all_land(
        base in base_table(),
        picks in prop::collection::vec((any::<Index>(), any::<u32>()), 0..=MAX_ROWS),
    ) {
        let rows = in_order(&base, picks);

        let mut expected = base.clone();
        for row in &rows {
            let e = expected.iter_mut().find(|e| e.reg == row.reg).unwrap();
            e.val = row.val;
        }

        let (table, matched, reads) = through_eeprom(&base, &rows);
        prop_assert_eq!(table, expected);
        prop_assert_eq!(usize::from(matched), rows.len());
        prop_assert_eq!(reads, rows.len());
    }

    #[test]
    fn arbitrary_overrides_match_reference(
        base in base_table(),
        regs in prop::collection::vec((1u32..0x400, any::<u32>()), 0..=MAX_ROWS),
    ) {
        let rows: Vec<_> = regs
            .into_iter()
            .map(|(reg, val)| DramCfgParam::new(reg, val))
            .collect();
        let (expected, expected_matched) = reference(&base, &rows);

        let (table, matched, reads) = through_eeprom(&base, &rows);
        prop_assert_eq!(&table, &expected);
        prop_assert_eq!(usize::from(matched), expected_matched);
        // Every row is read, matched or not.
        prop_assert_eq!(reads, rows.len());
        // Registers never move.
        prop_assert!(table.iter().zip(&base).all(|(t, b)| t.reg == b.reg));
    }

    #[test]
    fn merge_cursor_never_moves_back(
        base in base_table(),
        regs in prop::collection::vec(1u32..0x400, 0..=MAX_ROWS),
    ) {
        let mut table = base.clone();
        let mut merge = Merge::new(&mut table);
        let mut last = 0;
        for reg in regs {
            let hit = merge.apply(DramCfgParam::new(reg, 0));
            prop_assert!(merge.cursor() >= last);
            match hit {
                Some(i) => prop_assert_eq!(i, merge.cursor()),
                None => prop_assert_eq!(merge.cursor(), base.len()),
            }
            last = merge.cursor();
        }
    }
}
