// Integration tests: matrix in, DBC files out
use can_matrix_dbc::{analyze, Converter, ConverterConfig, ConverterError, MatrixTable};
use std::fs;
use std::path::Path;

const BILINGUAL_HEADERS: &[&str] = &[
    "Msg ID\n报文标识符",
    "Msg Name\n报文名称",
    "Msg Length (Byte)\n报文长度",
    "Signal Name\n信号名称",
    "Start Byte\n起始字节",
    "Start Bit\n起始位",
    "Bit Length (Bit)\n信号长度",
    "Byte Order\n排列格式",
    "Date Type\n数据类型",
    "Factor\n比例因子",
    "Offset\n偏移量",
    "Signal Min. Value (phys)\n物理最小值",
    "Signal Max. Value (phys)\n物理最大值",
    "Unit\n单位",
    "Signal Description\n信号描述",
    "VCU_P",
    "BMS_P",
    "VCU_E",
    "LV1_EV",
];

fn vehicle_matrix() -> MatrixTable {
    let rows = vec![
        vec!["0x100", "EngineStatus", "8", "", "", "", "", "", "", "", "", "", "", "", "", "Tx", "", "", ""],
        vec![
            "", "", "", "EngineSpeed", "0", "0", "16", "Intel", "Unsigned", "0.1", "0", "0", "6553.5", "rpm",
            "发动机转速", "", "Rx", "Rx", "",
        ],
        vec![
            "", "", "", "EngineTemp", "2", "0", "8", "Intel", "Signed", "1", "-40", "-40", "215", "°C",
            "", "", "Rx", "", "",
        ],
        vec!["0x1A0", "BatteryStatus", "8", "", "", "", "", "", "", "", "", "", "", "", "", "", "Tx", "", ""],
        vec![
            "", "", "", "PackVoltage", "0", "0", "16", "Motorola", "Unsigned", "0.01", "0", "0", "655.35", "V",
            "", "Rx", "", "", "",
        ],
        vec![
            "", "", "", "InsulationRes", "2", "0", "16", "Motorola", "Unsigned", "1", "0", "0", "65535", "kΩ",
            "", "Rx", "", "", "",
        ],
        vec!["0x300", "BodyStatus", "4", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "Tx", "1"],
        vec![
            "", "", "", "DoorOpen", "0", "0", "1", "Intel", "Unsigned", "1", "0", "0", "1", "", "", "", "", "",
            "",
        ],
    ];
    MatrixTable::new(BILINGUAL_HEADERS.to_vec(), rows).unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn dbc_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".dbc"))
        .collect();
    names.sort();
    names
}

fn parse_with_can_dbc(text: &str) -> can_dbc::DBC {
    match can_dbc::DBC::from_slice(text.as_bytes()) {
        Ok(dbc) => dbc,
        // Trailing sections can-dbc does not model are reported as incomplete
        Err(can_dbc::Error::Incomplete(dbc, _)) => dbc,
        Err(e) => panic!("can-dbc rejected the generated file: {:?}", e),
    }
}

#[test]
fn test_minimal_matrix_end_to_end() {
    init_logging();
    let table = MatrixTable::new(
        vec!["Msg ID", "Msg Name", "DLC", "Signal Name", "Start Byte", "Start Bit", "Bit Length", "Factor"],
        vec![
            vec!["0x100", "EngineStatus", "8", "", "", "", "", ""],
            vec!["", "", "", "EngineSpeed", "0", "0", "16", "0.1"],
        ],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("engine.dbc");
    let artifacts = Converter::default().convert(&table).write_all(&base);

    assert_eq!(artifacts.len(), 1);
    let artifact = artifacts.into_iter().next().unwrap().unwrap();
    assert_eq!(artifact.path, dir.path().join("engine_CAN.dbc"));
    assert_eq!(artifact.num_messages, 1);
    assert_eq!(artifact.num_signals, 1);

    let text = fs::read_to_string(&artifact.path).unwrap();
    assert!(text.contains(
        "BO_ 256 EngineStatus: 8 Vector__XXX\n SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|0] \"\" Vector__XXX\n"
    ));
}

#[test]
fn test_bus_partition_writes_one_file_per_bus() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("vehicle");

    let conversion = Converter::default().convert(&vehicle_matrix());
    let artifacts = conversion.write_all(&base);

    assert!(artifacts.iter().all(|a| a.is_ok()));
    assert_eq!(dbc_files(dir.path()), vec!["vehicle_ECAN.dbc", "vehicle_PCAN.dbc"]);

    let pcan = fs::read_to_string(dir.path().join("vehicle_PCAN.dbc")).unwrap();
    assert!(pcan.contains("BU_: VCU_P BMS_P Vector__XXX\n"));
    assert!(pcan.contains("BO_ 256 EngineStatus: 8 VCU_P\n"));
    assert!(pcan.contains("BO_ 416 BatteryStatus: 8 BMS_P\n"));
    assert!(!pcan.contains("BodyStatus"));

    let ecan = fs::read_to_string(dir.path().join("vehicle_ECAN.dbc")).unwrap();
    assert!(ecan.contains("BU_: VCU_E Vector__XXX\n"));
    assert!(ecan.contains("BO_ 256 EngineStatus: 8 Vector__XXX\n"));
    assert!(ecan.contains(" SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|6553.5] \"rpm\" VCU_E\n"));
    assert!(ecan.contains("BO_ 768 BodyStatus: 4 VCU_E\n"));
    assert!(!ecan.contains("LV1_EV"));
}

#[test]
fn test_generated_files_are_ascii() {
    let dir = tempfile::tempdir().unwrap();
    let conversion = Converter::default().convert(&vehicle_matrix());

    for artifact in conversion.write_all(&dir.path().join("vehicle.dbc")) {
        let bytes = fs::read(artifact.unwrap().path).unwrap();
        assert!(bytes.is_ascii());
        assert!(!bytes.contains(&b'\r'));
    }

    let pcan = fs::read_to_string(dir.path().join("vehicle_PCAN.dbc")).unwrap();
    assert!(pcan.contains("\"kOhm\""));
    assert!(pcan.contains("\"degC\""));
}

#[test]
fn test_generation_is_idempotent() {
    let table = vehicle_matrix();
    let first: Vec<String> = Converter::default()
        .convert(&table)
        .render_all()
        .into_iter()
        .map(|r| r.unwrap().text)
        .collect();
    let second: Vec<String> = Converter::default()
        .convert(&table)
        .render_all()
        .into_iter()
        .map(|r| r.unwrap().text)
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_round_trip_through_analyzer() {
    let conversion = Converter::default().convert(&vehicle_matrix());

    for rendered in conversion.render_all() {
        let rendered = rendered.unwrap();
        let report = analyze(&rendered.text);
        assert!(report.is_valid(), "{:?}", report.malformed);

        let bus = conversion.partition.find_bus(&rendered.bus).unwrap();
        let messages = conversion.bus_messages(bus);
        assert_eq!(report.messages.len(), messages.len());

        for message in &messages {
            let parsed: Vec<_> = report
                .signals_of(message.id)
                .map(|s| (s.start_bit, s.length, s.factor, s.offset))
                .collect();
            let expected: Vec<_> = message
                .signals
                .iter()
                .map(|s| (s.start_bit, s.length, s.factor, s.offset))
                .collect();
            assert_eq!(parsed, expected);
        }
    }
}

#[test]
fn test_third_party_parser_accepts_output() {
    init_logging();
    let conversion = Converter::default().convert(&vehicle_matrix());
    let pcan = conversion.partition.find_bus("PCAN").unwrap();
    let rendered = conversion.render_bus(pcan).unwrap();

    let dbc = parse_with_can_dbc(&rendered.text);
    assert_eq!(dbc.messages().len(), 2);

    let engine = dbc
        .messages()
        .iter()
        .find(|m| m.message_name() == "EngineStatus")
        .unwrap();
    assert_eq!(engine.message_id().0, 256);
    assert_eq!(*engine.message_size(), 8);
    assert_eq!(engine.signals().len(), 2);

    let temp = engine
        .signals()
        .iter()
        .find(|s| s.name() == "EngineTemp")
        .unwrap();
    assert_eq!(*temp.start_bit(), 16);
    assert_eq!(*temp.signal_size(), 8);
    assert_eq!(*temp.offset(), -40.0);
}

#[test]
fn test_requested_bus_without_data_fails_alone() {
    init_logging();
    let table = MatrixTable::new(
        vec!["Msg ID", "Signal Name", "VCU_P", "VCU_E"],
        vec![
            vec!["0x10", "", "Tx", ""],
            vec!["", "Speed", "", ""],
            vec!["0x20", "", "", "Tx"],
        ],
    )
    .unwrap();

    let converter = Converter::new(ConverterConfig::new().with_bus_filter("E")).unwrap();
    let results = converter.convert(&table).render_all();
    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0], Err(ConverterError::EmptyBus(bus)) if bus == "ECAN"));

    let results = Converter::default().convert(&table).render_all();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn test_can_fd_dlc_range() {
    let table = MatrixTable::new(
        vec!["Msg ID", "Msg Name", "DLC", "Signal Name", "Start Byte", "Bit Length"],
        vec![vec!["0x400", "FdFrame", "15", "", "", ""], vec!["", "", "", "Payload", "60", "32"]],
    )
    .unwrap();

    let classic = Converter::default().convert(&table);
    assert_eq!(classic.model.messages()[0].dlc, 8);
    assert_eq!(classic.diagnostics.len(), 2);

    let fd = Converter::new(ConverterConfig::new().with_can_fd(true)).unwrap().convert(&table);
    assert_eq!(fd.model.messages()[0].dlc, 15);
    assert!(fd.diagnostics.is_empty());
    let rendered = fd.render_all().remove(0).unwrap();
    assert!(rendered.text.contains("BO_ 1024 FdFrame: 15 Vector__XXX\n"));
}

#[test]
fn test_localized_only_names_stay_parseable() {
    init_logging();
    let table = MatrixTable::new(
        vec!["Msg ID", "Msg Name", "Signal Name", "Start Byte", "Bit Length"],
        vec![
            vec!["0x100", "发动机状态", "", "", ""],
            vec!["", "", "车速", "0", "16"],
        ],
    )
    .unwrap();

    let conversion = Converter::default().convert(&table);
    let rendered = conversion.render_all().into_iter().next().unwrap().unwrap();

    let report = analyze(&rendered.text);
    assert!(report.is_valid(), "malformed lines: {:?}", report.malformed);
    assert!(rendered.text.contains("BO_ 256 MSG_0x100: 8 Vector__XXX\n SG_ SIG_ROW3 : 0|16@1+"));
    assert!(rendered.text.contains("BA_ \"GenSigStartValue\" SG_ 256 SIG_ROW3 0;"));
    parse_with_can_dbc(&rendered.text);
}
