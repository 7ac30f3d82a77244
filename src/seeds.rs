//! Seed data: a built-in question bank and editorial entries that keep the
//! app useful without external config and without a remote store.

use std::collections::BTreeMap;

use crate::domain::{Category, EditorialEntry, Question};

fn q(id: u32, prompt: &str, options: &[(&str, &str)], correct_key: &str) -> Question {
    let options: BTreeMap<String, String> = options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Question {
        id,
        prompt: prompt.to_string(),
        options,
        correct_key: correct_key.to_string(),
        category: None,
    }
}

/// Minimal built-in bank: enough for the first days of a challenge and for
/// random practice rounds. Real deployments replace this via TOML or the
/// remote store.
pub fn seed_question_bank() -> Vec<Category> {
    vec![
        Category {
            name: "Korrika".into(),
            questions: vec![
                q(
                    101,
                    "Zein urtetan antolatu zen lehen Korrika?",
                    &[("a", "1980"), ("b", "1977"), ("c", "1984"), ("d", "1991")],
                    "a",
                ),
                q(
                    102,
                    "Nork antolatzen du Korrika?",
                    &[("a", "Eusko Jaurlaritzak"), ("b", "AEK-k"), ("c", "Udalek"), ("d", "Ikastolek")],
                    "b",
                ),
                q(
                    103,
                    "Zer eramaten da eskuz esku Korrikan?",
                    &[("a", "Ikurrina"), ("b", "Zuzia"), ("c", "Lekukoa"), ("d", "Makila")],
                    "c",
                ),
                q(
                    104,
                    "Zenbat egunez jarraian egiten da Korrika, gau eta egun?",
                    &[("a", "Hiru"), ("b", "Bost"), ("c", "Zazpi"), ("d", "Hamaika")],
                    "d",
                ),
            ],
        },
        Category {
            name: "Euskara".into(),
            questions: vec![
                q(
                    201,
                    "Nola esaten da euskaraz 'buenos días'?",
                    &[("a", "Gabon"), ("b", "Egun on"), ("c", "Arratsalde on"), ("d", "Ongi etorri")],
                    "b",
                ),
                q(
                    202,
                    "Zein da 'etxe' hitzaren esanahia?",
                    &[("a", "Casa"), ("b", "Calle"), ("c", "Monte"), ("d", "Mar")],
                    "a",
                ),
                q(
                    203,
                    "Zenbat euskalki nagusi bereizten dira gaur egun?",
                    &[("a", "Hiru"), ("b", "Bost"), ("c", "Zazpi"), ("d", "Bederatzi")],
                    "b",
                ),
                q(
                    204,
                    "Zer da 'lauburua'?",
                    &[("a", "Dantza bat"), ("b", "Ikur bat"), ("c", "Kirol bat"), ("d", "Jaki bat")],
                    "b",
                ),
            ],
        },
        Category {
            name: "Kultura".into(),
            questions: vec![
                q(
                    301,
                    "Zein kirol jokatzen da frontoian?",
                    &[("a", "Pilota"), ("b", "Errugbia"), ("c", "Saskibaloia"), ("d", "Tenisa")],
                    "a",
                ),
                q(
                    302,
                    "Nor da 'Obabakoak' liburuaren egilea?",
                    &[("a", "Gabriel Aresti"), ("b", "Bernardo Atxaga"), ("c", "Katixa Agirre"), ("d", "Kirmen Uribe")],
                    "b",
                ),
                q(
                    303,
                    "Zein da bertsolaritzaren oinarria?",
                    &[("a", "Dantza"), ("b", "Margoa"), ("c", "Bat-bateko kantua"), ("d", "Antzerkia")],
                    "c",
                ),
                q(
                    304,
                    "Non ospatzen da Aste Nagusia abuztuan?",
                    &[("a", "Gasteizen"), ("b", "Bilbon"), ("c", "Iruñean"), ("d", "Baionan")],
                    "b",
                ),
            ],
        },
    ]
}

/// Built-in editorial snippets. Day 0 is the pre-challenge welcome; the rest
/// are 1-based challenge days.
pub fn seed_editorial() -> Vec<EditorialEntry> {
    vec![
        EditorialEntry {
            day: 0,
            title: "Laster hasiko da!".into(),
            body: "Erronka laster abiatuko da. Prestatu zure taldea eta egunero galdera sorta bat erantzun.".into(),
        },
        EditorialEntry {
            day: 1,
            title: "Lehen eguna".into(),
            body: "Ongi etorri erronkara! Gaurtik aurrera egun bakoitzak bere galdera sorta du.".into(),
        },
        EditorialEntry {
            day: 2,
            title: "Bigarren eguna".into(),
            body: "Lekukoa ez da gelditzen: gaurko galderak prest daude.".into(),
        },
    ]
}
