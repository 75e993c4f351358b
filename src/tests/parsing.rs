use crate::{
    parsing::{
        ambiguity::{
            check_ambiguity_flags, clean_ambiguity_flags, convert_ambiguity_flags_dir,
            rewrite_sorted, switch_flags,
        },
        attitude::{normalize_attitude_file, normalize_attitude_file_among},
        clock::read_clock_file,
        clock_difference::read_clock_difference_summary,
        observation::{check_observation_antenna, read_observation_file},
        orbit::read_orbit_file,
        orbit_difference::{read_orbit_difference_series, read_orbit_difference_summary},
        residual::{read_residual_file, read_residual_header, read_sigma},
        timing::read_timing_log,
    },
    prelude::{
        AmbiguityFlagFile, AmbiguityStatus, ClockType, Component, MjdTime, ParsingError,
        TrackingArc, SV,
    },
    tests::{
        init_logger,
        toolkit::{self, data_path, temp_dir},
    },
};

use rstest::*;

use std::str::FromStr;

#[test]
fn orbit_file() {
    init_logger();

    let records = read_orbit_file(&data_path("orbit/orb_2020001")).unwrap();

    // 20 epochs, 4 satellites, nothing past EOF
    assert_eq!(records.len(), 80);
    assert!(records.iter().all(|r| r.epoch.mjd == 58849));
    assert!(records.iter().all(|r| r.position_m.x < 0.0));

    let first = &records[0];
    assert_eq!(first.sv, SV::from_str("G01").unwrap());
    assert_eq!(first.epoch.sod, 0.0);
    assert!((first.position_m.x + 11_044_805.8).abs() < 1.0E-3);
    assert!((first.position_m.y + 10_475_672.35).abs() < 1.0E-3);
    assert!((first.position_m.z - 21_929_418.2).abs() < 1.0E-3);

    let last = &records[79];
    assert_eq!(last.sv, SV::from_str("E11").unwrap());
    assert_eq!(last.epoch.sod, 19.0 * 300.0);

    assert!(read_orbit_file(&data_path("orbit/orb_2020002")).is_none());
}

#[rstest]
#[case("00:00:00", 1)]
#[case("00:04:59", 1)]
#[case("00:05:00", 2)]
#[case("00:09:30", 2)]
#[case("01:00:00", 13)]
#[case("23:55:00", 288)]
fn residual_epoch_index(#[case] time: &str, #[case] index: i64) {
    init_logger();

    let t = MjdTime::from_str(&format!("2020-01-01 {}", time)).unwrap();
    let records = read_residual_file(&data_path("residual/res_2020001")).unwrap();

    let found = records
        .iter()
        .filter(|r| r.sod == t.sod)
        .collect::<Vec<_>>();

    assert_eq!(found.len(), 9, "missing residuals at {}", time);
    assert!(found.iter().all(|r| r.index == index));
}

#[rstest]
#[case("999999999-1-1 0:0:0")]
#[case("2020-13-45 99:99:99")]
#[case("2147483647-12-31 23")]
fn corrupted_residual_time(#[case] corrupted: &str) {
    init_logger();

    let dir = temp_dir("residual");
    let path = dir.join("res_2020001");

    let start = MjdTime::new(58849, 0.0);
    let t1 = MjdTime::new(58849, 600.0);

    let mut bad = toolkit::residual_line(&start, "abmf", "G05", "LC12", 1.0, 0.02);
    bad.replace_range(11..30, corrupted);

    let lines = [
        toolkit::residual_line(&start, "abmf", "G01", "LC12", 1.0, 0.01),
        bad,
        toolkit::residual_line(&t1, "ajac", "E11", "PC12", 0.5, -0.03),
    ];

    toolkit::residual_file(&path, &start, 300, 1.5, &lines);

    let records = read_residual_file(&path).unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].sv, SV::from_str("G01").unwrap());
    assert_eq!(records[0].index, 1);
    assert_eq!(records[1].site, "ajac");
    assert_eq!(records[1].index, 3);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn residual_file() {
    init_logger();

    let path = data_path("residual/res_2020001");

    let header = read_residual_header(&path).unwrap();
    assert_eq!(header.start, MjdTime::new(58849, 0.0));
    assert_eq!(header.interval.to_seconds(), 300.0);

    assert_eq!(read_sigma(&path), Some(1.234));

    let records = read_residual_file(&path).unwrap();
    assert_eq!(records.len(), 54);

    for pair in records.windows(2) {
        assert!(pair[0].index <= pair[1].index);
    }

    let first = &records[0];
    assert_eq!(first.site, "abmf");
    assert_eq!(first.sv, SV::from_str("G01").unwrap());
    assert_eq!(first.observable, "LC12");
    assert_eq!(first.weight, 1.0);
    assert_eq!(first.residual, 0.0123);
    assert_eq!(first.fmjd, 58849.0);

    assert!(records.iter().any(|r| r.site == "algo"));
    assert!(records
        .iter()
        .any(|r| r.sv == SV::from_str("E11").unwrap()));
}

#[test]
fn observation_file() {
    init_logger();

    let records = read_observation_file(&data_path("observation/abmf0010.20o"))
        .unwrap()
        .unwrap();

    assert_eq!(records.len(), 5);

    let g01 = SV::from_str("G01").unwrap();
    let g05 = SV::from_str("G05").unwrap();
    let e11 = SV::from_str("E11").unwrap();

    assert_eq!(records[0].sv, g01);
    assert_eq!(records[0].epoch, MjdTime::new(58849, 0.0));
    assert_eq!(records[0].observations.len(), 8);
    assert_eq!(records[0].observations.get("C1C"), Some(&20_000_000.0));
    assert_eq!(records[0].observations.get("L1C"), Some(&20_000_001.0));
    assert!(records[0].observations.get("D1C").is_none());
    assert!(records[0].observations.get("S2W").is_none());

    // blank fields are not reported
    assert_eq!(records[1].sv, g05);
    assert_eq!(records[1].observations.len(), 6);
    assert!(records[1].observations.get("C2L").is_none());
    assert!(records[1].observations.get("L2L").is_none());
    assert_eq!(records[1].observations.get("L5Q"), Some(&21_000_013.0));

    assert_eq!(records[2].sv, e11);
    assert_eq!(records[2].observations.len(), 4);
    assert_eq!(records[2].observations.get("L1C"), Some(&120_000_000.25));

    // event block skipped, undeclared system skipped
    assert_eq!(records[3].sv, g01);
    assert_eq!(records[3].epoch.sod, 300.0);
    assert_eq!(records[4].sv, e11);
    assert_eq!(records[4].observations.len(), 1);
    assert_eq!(records[4].observations.get("C1C"), Some(&23_000_300.5));

    assert!(read_observation_file(&data_path("observation/none0010.20o"))
        .unwrap()
        .is_none());
}

#[test]
fn observation_errors() {
    init_logger();

    match read_observation_file(&data_path("observation/ajac0010.20o")) {
        Err(ParsingError::UnsupportedEpochFlag(flag)) => assert_eq!(flag, "1"),
        other => panic!("unexpected result: {:?}", other),
    }

    assert!(matches!(
        read_observation_file(&data_path("observation/algo0010.20o")),
        Err(ParsingError::ReceiverChanged)
    ));

    assert!(matches!(
        read_observation_file(&data_path("observation/brst0010.20o")),
        Err(ParsingError::TruncatedEpoch(_))
    ));
}

#[test]
fn clock_file() {
    init_logger();

    let path = data_path("clock/satclk_2020001");

    let satellites = read_clock_file(&path, ClockType::Satellite).unwrap();
    assert_eq!(satellites.len(), 3);
    assert_eq!(satellites[0].name, "G01");
    assert_eq!(satellites[0].offset_s, -1.234567890123E-04);
    assert_eq!(satellites[1].name, "G05");
    assert_eq!(satellites[1].offset_s, 3.33E-05);
    assert_eq!(satellites[2].epoch, MjdTime::new(58849, 300.0));

    let receivers = read_clock_file(&path, ClockType::Receiver).unwrap();
    assert_eq!(receivers.len(), 1);
    assert_eq!(receivers[0].name, "ABMF");

    assert!(read_clock_file(&data_path("clock/satclk_2020002"), ClockType::Satellite).is_none());
}

#[test]
fn clock_difference_summary() {
    init_logger();

    let path = data_path("clkdif/clkdif_2020001_com_G");

    // G01 and E01 serve as references, G05 is an outlier
    let records = read_clock_difference_summary(&path, 58849, None).unwrap();
    let names = records
        .iter()
        .map(|r| r.sv.to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["G08", "E02", "E11"]);
    assert!(records.iter().all(|r| r.day == 58849));
    assert_eq!(records[0].value, 0.12);
    assert_eq!(records[2].value, 2.99);

    let reference = SV::from_str("G08").unwrap();
    let records = read_clock_difference_summary(&path, 58849, Some(reference)).unwrap();
    let names = records
        .iter()
        .map(|r| r.sv.to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["G01", "E01", "E02", "E11"]);
}

#[test]
fn orbit_difference_summary() {
    init_logger();

    let records =
        read_orbit_difference_summary(&data_path("orbdif/orbdif_2020001_com")).unwrap();

    // G05 exceeds the sanity ceiling
    assert_eq!(records.len(), 12);
    assert!(records
        .iter()
        .all(|r| r.sv != SV::from_str("G05").unwrap()));
    assert!(records.iter().all(|r| r.fmjd == 58849.0));

    let g01 = SV::from_str("G01").unwrap();
    let value = |component: Component| {
        records
            .iter()
            .find(|r| r.sv == g01 && r.component == component)
            .map(|r| r.value_cm)
    };

    assert_eq!(value(Component::Along), Some(3.0));
    assert_eq!(value(Component::Cross), Some(4.0));
    assert_eq!(value(Component::Radial), Some(0.0));
    assert_eq!(value(Component::ThreeD), Some(5.0));

    let e11 = records
        .iter()
        .find(|r| r.sv == SV::from_str("E11").unwrap() && r.component == Component::Along)
        .unwrap();
    assert_eq!(e11.value_cm, -1.2);
}

#[test]
fn orbit_difference_series() {
    init_logger();

    let records =
        read_orbit_difference_series(&data_path("orbdif/orbdif_2020001_com")).unwrap();

    assert_eq!(records.len(), 36);

    let elapsed = records
        .iter()
        .filter(|r| r.sv == SV::from_str("G02").unwrap() && r.component == Component::Along)
        .map(|r| r.elapsed_s)
        .collect::<Vec<_>>();

    assert_eq!(elapsed, vec![0.0, 300.0, 600.0]);
}

#[test]
fn ambiguity_flags() {
    init_logger();

    let dir = temp_dir("ambflag");
    let abmf = dir.join("abmf0010.20o.log");
    let ajac = dir.join("ajac0010.20o.log");

    std::fs::copy(data_path("ambflag/abmf0010.20o.log"), &abmf).unwrap();
    std::fs::copy(data_path("ambflag/ajac0010.20o.log"), &ajac).unwrap();

    assert!(check_ambiguity_flags(&abmf, 1000));
    assert!(!check_ambiguity_flags(&ajac, 1000));
    assert!(check_ambiguity_flags(&ajac, 500));
    assert!(!check_ambiguity_flags(&dir.join("algo0010.20o.log"), 0));

    rewrite_sorted(&abmf).unwrap();

    let backup = dir.join("abmf0010.20o.log.bak");
    assert!(backup.is_file());

    let file = AmbiguityFlagFile::read(&abmf).unwrap();
    assert_eq!(file.header.len(), 4);

    let order = file
        .records
        .iter()
        .map(|r| (r.satellite.as_str(), r.start))
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![("G01", 1), ("G05", 10), ("G05", 50), ("G12", 90), ("G12", 100)]
    );

    switch_flags(&abmf, AmbiguityStatus::Amb, AmbiguityStatus::Del).unwrap();

    let file = AmbiguityFlagFile::read(&abmf).unwrap();
    assert!(file
        .records
        .iter()
        .all(|r| r.status != AmbiguityStatus::Amb));
    assert_eq!(
        file.records
            .iter()
            .filter(|r| r.status == AmbiguityStatus::Del)
            .count(),
        3
    );

    // the backup keeps the very first version
    let original = AmbiguityFlagFile::read(&backup).unwrap();
    assert_eq!(original.records[0].satellite, "G12");
    assert_eq!(original.records[0].status, AmbiguityStatus::Iam);

    // an IAM interval still makes the file valid
    assert!(check_ambiguity_flags(&abmf, 1000));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn ambiguity_cleaning() {
    init_logger();

    let dir = temp_dir("ambclean");
    let abmf = dir.join("abmf0010.20o.log");
    std::fs::copy(data_path("ambflag/abmf0010.20o.log"), &abmf).unwrap();

    let arc = |satellite: &str, start, end| TrackingArc {
        satellite: satellite.to_string(),
        start,
        end,
    };

    // starts before the flagged interval, or another satellite
    let outside = [arc("G12", 5, 15), arc("G05", 11, 19)];
    assert_eq!(clean_ambiguity_flags(&abmf, &outside, 10).unwrap(), 0);

    let inside = [arc("G12", 11, 19)];
    assert_eq!(clean_ambiguity_flags(&abmf, &inside, 10).unwrap(), 1);

    let file = AmbiguityFlagFile::read(&abmf).unwrap();
    assert_eq!(file.header.len(), 4);
    assert_eq!(file.records.len(), 5);
    assert!(file
        .records
        .iter()
        .all(|r| r.status != AmbiguityStatus::Iam));
    assert_eq!(file.records[0].satellite, "G12");
    assert_eq!(file.records[0].status, AmbiguityStatus::Amb);
    assert_eq!(file.records[4].status, AmbiguityStatus::Bad);

    let original = AmbiguityFlagFile::read(&dir.join("abmf0010.20o.log.bak")).unwrap();
    assert_eq!(original.records[0].status, AmbiguityStatus::Iam);

    assert_eq!(
        clean_ambiguity_flags(&dir.join("algo0010.20o.log"), &inside, 10).unwrap(),
        0
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn ambiguity_directory_conversion() {
    init_logger();

    let dir = temp_dir("ambconv");
    let converted = dir.join("converted");

    assert_eq!(
        convert_ambiguity_flags_dir(&data_path("ambflag_legacy"), &converted).unwrap(),
        2
    );

    let mut names = std::fs::read_dir(&converted)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["abmf0010.20o.log", "abmf0010.20o.log13"]);

    let file = AmbiguityFlagFile::read(&converted.join("abmf0010.20o.log")).unwrap();
    assert_eq!(file.header.len(), 3);

    let order = file
        .records
        .iter()
        .map(|r| (r.satellite.as_str(), r.start))
        .collect::<Vec<_>>();
    assert_eq!(order, vec![("G01", 1), ("G05", 100), ("G05", 500), ("G12", 1000)]);

    let file = AmbiguityFlagFile::read(&converted.join("abmf0010.20o.log13")).unwrap();
    assert_eq!(file.records[0].satellite, "E11");
    assert_eq!(file.records[0].status, AmbiguityStatus::Iam);

    assert!(convert_ambiguity_flags_dir(&dir.join("missing"), &converted).is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn observation_antenna() {
    init_logger();

    let dir = temp_dir("antenna");
    let antex = data_path("antex/igs14_excerpt.atx");

    let antenna = |path: &std::path::Path| {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .find(|line| line.contains("ANT # / TYPE"))
            .map(|line| line[20..40].to_string())
            .unwrap()
    };

    // radome differs from the calibrated one
    let zimm = dir.join("zimm0010.20o");
    std::fs::copy(data_path("observation/zimm0010.20o"), &zimm).unwrap();

    assert!(!check_observation_antenna(&zimm, &antex, false).unwrap());
    assert_eq!(antenna(&zimm), "TRM59800.00     SCIT");
    assert!(!dir.join("zimm0010.20o.bak").exists());

    assert!(check_observation_antenna(&zimm, &antex, true).unwrap());
    assert_eq!(antenna(&zimm), "TRM59800.00     NONE");
    assert_eq!(
        antenna(&dir.join("zimm0010.20o.bak")),
        "TRM59800.00     SCIT"
    );

    // the rest of the file is preserved
    let records = read_observation_file(&zimm).unwrap().unwrap();
    assert_eq!(records.len(), 1);

    assert!(check_observation_antenna(&zimm, &antex, false).unwrap());

    // calibrated as is
    let wtzr = dir.join("wtzr0010.20o");
    std::fs::copy(data_path("observation/wtzr0010.20o"), &wtzr).unwrap();
    assert!(check_observation_antenna(&wtzr, &antex, true).unwrap());
    assert!(!dir.join("wtzr0010.20o.bak").exists());

    // not calibrated at all
    let onsa = dir.join("onsa0010.20o");
    std::fs::copy(data_path("observation/onsa0010.20o"), &onsa).unwrap();
    assert!(!check_observation_antenna(&onsa, &antex, true).unwrap());
    assert_eq!(antenna(&onsa), "JAVRINGANT_DM   NONE");

    assert!(!check_observation_antenna(&wtzr, &dir.join("igs14.atx"), true).unwrap());
    assert!(!check_observation_antenna(&dir.join("algo0010.20o"), &antex, true).unwrap());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn timing_log() {
    init_logger();

    let records = read_timing_log(&data_path("timing/time_info_2020001")).unwrap();
    assert_eq!(records.len(), 3);

    let epochs = records.iter().map(|r| r.epoch.sod).collect::<Vec<_>>();
    assert_eq!(epochs, vec![0.0, 300.0, 600.0]);
    assert!(records.iter().all(|r| r.epoch.mjd == 58849));

    let first = &records[0];
    assert!((first.processing.to_seconds() - 1.234).abs() < 1.0E-9);
    assert_eq!(first.receivers, 3);
    assert_eq!(first.observations, 5120);

    assert_eq!(records[2].receivers, 2);
    assert_eq!(records[2].observations, 3390);

    assert!(read_timing_log(&data_path("timing/time_info_2020002")).is_none());
}

#[test]
fn attitude_normalization() {
    init_logger();

    let dir = temp_dir("attitude");
    let path = dir.join("att_grace-c");

    let mut content = "% produced by some other tool\n".to_string();
    for i in 0..150 {
        content.push_str(&format!(
            "58849 {:>12.5}  0.1 0.2 0.3 0.9\n",
            10.0 + i as f64 * 5.0
        ));
    }
    std::fs::write(&path, content).unwrap();

    let header = normalize_attitude_file(&path).unwrap().unwrap();
    assert_eq!(header.satellite, "GRACE-C");
    assert_eq!(header.start, MjdTime::new(58849, 10.0));
    assert_eq!(header.end, MjdTime::new(58849, 10.0 + 149.0 * 5.0));
    assert_eq!(header.interval_s, 5.0);

    let lines = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| line.to_string())
        .collect::<Vec<_>>();

    assert_eq!(lines.len(), 6 + 150);
    assert!(lines[0].starts_with("%% Header"));
    assert!(lines[5].starts_with("%% End of Header"));
    assert!(lines[6].starts_with("58849"));

    // normalizing twice is harmless
    let again = normalize_attitude_file(&path).unwrap().unwrap();
    assert_eq!(again, header);

    assert!(matches!(
        normalize_attitude_file(&dir.join("att_tiangong")),
        Err(ParsingError::UnknownSatellite(_))
    ));

    // custom table
    assert!(matches!(
        normalize_attitude_file_among(&path, &["swarm-a"]),
        Err(ParsingError::UnknownSatellite(_))
    ));
    assert_eq!(
        normalize_attitude_file_among(&path, &["grace-c"]).unwrap(),
        Some(header)
    );

    assert!(normalize_attitude_file(&dir.join("att_grace-d"))
        .unwrap()
        .is_none());

    std::fs::remove_dir_all(&dir).unwrap();
}
