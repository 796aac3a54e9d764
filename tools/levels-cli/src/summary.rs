//! 运行结果摘要.

use std::io::{self, Write};

use spine_levels::overlap::LevelOverlap;
use spine_levels::table::{LevelRecord, RootletDistance};

const SEP: &str = "--------------------------------------------------------";
const S4: &str = "    ";

#[inline]
fn f64_to_display(f: Option<f64>) -> String {
    match f {
        Some(f) => format!("{f:.3}"),
        None => "/".to_string(),
    }
}

#[inline]
fn usize_to_display(u: Option<usize>) -> String {
    match u {
        Some(u) => u.to_string(),
        None => "/".to_string(),
    }
}

/// 将单条记录写进 `w` 中.
fn describe_into<W: Write>(r: &LevelRecord, w: &mut W) -> io::Result<()> {
    writeln!(w, "Level {} (`{}`):", r.level, r.source)?;
    writeln!(
        w,
        "{S4}Slices: {} ..= {}",
        usize_to_display(r.slice_start),
        usize_to_display(r.slice_end)
    )?;
    writeln!(
        w,
        "{S4}Distance from PMJ: {} mm -> {} mm",
        f64_to_display(r.distance_start),
        f64_to_display(r.distance_end)
    )?;
    write!(w, "{S4}Height: {} mm", f64_to_display(r.height))?;
    Ok(())
}

/// 打印所有记录.
pub fn print_records(title: &str, records: &[LevelRecord]) {
    println!("{SEP}");
    println!("{title}: {} record(s)", records.len());
    println!("{SEP}");
    let mut buf = Vec::with_capacity(256);
    for r in records {
        // 写入 `Vec` 不会失败.
        if describe_into(r, &mut buf).is_ok() {
            println!("{}", String::from_utf8_lossy(&buf));
        }
        buf.clear();
    }
    println!("{SEP}");
}

/// 打印逐节段重叠率.
pub fn print_overlaps(overlaps: &[LevelOverlap]) {
    println!("{SEP}");
    for o in overlaps {
        println!("Level {}: {} %", o.level, f64_to_display(o.percent));
    }
    println!("{SEP}");
}

/// 打印神经根距离.
pub fn print_distances(records: &[RootletDistance]) {
    println!("{SEP}");
    for r in records {
        println!(
            "Rootlet {}: PMJ {} mm, disc {} mm",
            r.rootlet,
            f64_to_display(r.distance_pmj),
            f64_to_display(r.distance_disc)
        );
    }
    println!("{SEP}");
}
