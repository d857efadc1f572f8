#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tsbio::territory::TerritoryDefinition;
use tsbio::PipelineConfig;

pub const RENDA_ID: &str = "socioeconomia__ibge__renda_per_capita";
pub const AREA_ID: &str = "uso_do_solo__mapbiomas__area_agricola";
pub const EMPTY_ID: &str = "vazio__fonte_x__tema_vazio";

pub const ALTAMIRA: [&str; 8] = [
    "1500602", "1500859", "1501725", "1504455", "1505486", "1507805", "1508159", "1508357",
];

/// A throwaway project tree with the standard layout and a small raw corpus:
/// one fully covered theme, one partial theme, one theme with no member rows,
/// one file without a municipality column and one malformed file.
pub struct Project {
    pub dir: TempDir,
    pub config: PipelineConfig,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = PipelineConfig::for_project_dir(dir.path());
        config.territories = vec![TerritoryDefinition::new(1, "Altamira", &ALTAMIRA)];
        write_fixture(&config);
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, contents).expect("write fixture");
}

fn write_fixture(config: &PipelineConfig) {
    write_file(
        &config.dictionary_path,
        "canonical,label_pt,synonyms\ncod_municipio,Código do município,CD_MUN|geocodigo\nano,Ano,year\n",
    );

    let mut renda = String::from("CD_MUN;Ano;Renda (R$)\n");
    for (index, code) in ALTAMIRA.iter().enumerate() {
        let value = if index == 0 { "1.234,56".to_string() } else { format!("{}", 800 + index) };
        renda.push_str(&format!("{code};2019;{value}\n"));
    }
    renda.push_str("3550308;2019;999\n");
    write_file(
        &raw_path(config, "Socioeconomia/IBGE - Renda per capita - municipal.csv"),
        &renda,
    );

    let mut area = String::from("geocodigo,ano,Área (ha)\n");
    for code in &ALTAMIRA[..6] {
        area.push_str(&format!("{code},2020,10.5\n"));
    }
    write_file(&raw_path(config, "Uso do solo/MapBiomas - Area agricola.csv"), &area);

    write_file(
        &raw_path(config, "Vazio/Fonte X - Tema vazio.csv"),
        "cod_municipio;valor\n3550308;1\n",
    );
    write_file(&raw_path(config, "Outros/sem codigo.csv"), "nome;valor\nA;1\n");
    write_file(
        &raw_path(config, "Outros/quebrado.csv"),
        "cod_municipio;valor\n1500602;1;extra\n",
    );
}

pub fn raw_path(config: &PipelineConfig, relative: &str) -> PathBuf {
    config.raw_dir.join(relative)
}

/// Mark `ids` for the dashboard in the curated catalog, which must exist.
pub fn flag_in_curated(config: &PipelineConfig, ids: &[&str]) {
    let path = config.curated_catalog_path();
    let mut curated = tsbio::table::read_delimited(&path).expect("curated readable");
    let id = curated.column_index("indicador_id").expect("id column");
    let flag = curated.column_index("dashboard").expect("flag column");
    for row in &mut curated.rows {
        if ids.contains(&row[id].as_str()) {
            row[flag] = "sim".to_string();
        }
    }
    tsbio::table::write_table(&path, &curated, b',', true).expect("curated written");
}
