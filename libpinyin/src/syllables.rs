// pinyin-staged/src/syllables.rs
//
// Static pinyin syllable table.
// - `ü` is spelled out (lü, lüe, nü, nüe); the `v` keyboard spelling is
//   rewritten by the segmenter before lookup.
// - No bare initials: "b" or "zh" alone is not a syllable.
// - Lengths are in chars, so "lüe" has length 3.

use phf::phf_set;

/// Table revision; bump when syllables are added or removed.
pub const TABLE_VERSION: u32 = 2;

/// Longest syllable in chars (zhuang, chuang, shuang).
pub const MAX_SYLLABLE_LEN: usize = 6;

/// Shortest syllable in chars (a, e, o).
pub const MIN_SYLLABLE_LEN: usize = 1;

pub static PINYIN_SYLLABLES: phf::Set<&'static str> = phf_set! {
    "a", "ai", "an", "ang", "ao", "ba", "bai", "ban", "bang", "bao", "bei", "ben", "beng", "bi",
    "bian", "biao", "bie", "bin", "bing", "bo", "bu", "ca", "cai", "can", "cang", "cao", "ce",
    "cen", "ceng", "cha", "chai", "chan", "chang", "chao", "che", "chen", "cheng", "chi", "chong",
    "chou", "chu", "chuai", "chuan", "chuang", "chui", "chun", "chuo", "ci", "cong", "cou", "cu",
    "cuan", "cui", "cun", "cuo", "da", "dai", "dan", "dang", "dao", "de", "dei", "deng", "di",
    "dia", "dian", "diao", "die", "ding", "diu", "dong", "dou", "du", "duan", "dui", "dun", "duo",
    "e", "ei", "en", "er", "fa", "fan", "fang", "fei", "fen", "feng", "fo", "fou", "fu", "ga",
    "gai", "gan", "gang", "gao", "ge", "gei", "gen", "geng", "gong", "gou", "gu", "gua", "guai",
    "guan", "guang", "gui", "gun", "guo", "ha", "hai", "han", "hang", "hao", "he", "hei", "hen",
    "heng", "hong", "hou", "hu", "hua", "huai", "huan", "huang", "hui", "hun", "huo", "ji", "jia",
    "jian", "jiang", "jiao", "jie", "jin", "jing", "jiong", "jiu", "ju", "juan", "jue", "jun",
    "ka", "kai", "kan", "kang", "kao", "ke", "ken", "keng", "kong", "kou", "ku", "kua", "kuai",
    "kuan", "kuang", "kui", "kun", "kuo", "la", "lai", "lan", "lang", "lao", "le", "lei", "leng",
    "li", "lia", "lian", "liang", "liao", "lie", "lin", "ling", "liu", "lo", "long", "lou", "lu",
    "luan", "lun", "luo", "lü", "lüe", "ma", "mai", "man", "mang", "mao", "me", "mei", "men",
    "meng", "mi", "mian", "miao", "mie", "min", "ming", "miu", "mo", "mou", "mu", "na", "nai",
    "nan", "nang", "nao", "ne", "nei", "nen", "neng", "ng", "ni", "nian", "niang", "niao", "nie",
    "nin", "ning", "niu", "nong", "nou", "nu", "nuan", "nuo", "nü", "nüe", "o", "ou", "pa", "pai",
    "pan", "pang", "pao", "pei", "pen", "peng", "pi", "pian", "piao", "pie", "pin", "ping", "po",
    "pou", "pu", "qi", "qia", "qian", "qiang", "qiao", "qie", "qin", "qing", "qiong", "qiu", "qu",
    "quan", "que", "qun", "ran", "rang", "rao", "re", "ren", "reng", "ri", "rong", "rou", "ru",
    "ruan", "rui", "run", "ruo", "sa", "sai", "san", "sang", "sao", "se", "sen", "seng", "sha",
    "shai", "shan", "shang", "shao", "she", "shei", "shen", "sheng", "shi", "shou", "shu", "shua",
    "shuai", "shuan", "shuang", "shui", "shun", "shuo", "si", "song", "sou", "su", "suan", "sui",
    "sun", "suo", "ta", "tai", "tan", "tang", "tao", "te", "teng", "ti", "tian", "tiao", "tie",
    "ting", "tong", "tou", "tu", "tuan", "tui", "tun", "tuo", "wa", "wai", "wan", "wang", "wei",
    "wen", "weng", "wo", "wu", "xi", "xia", "xian", "xiang", "xiao", "xie", "xin", "xing", "xiong",
    "xiu", "xu", "xuan", "xue", "xun", "ya", "yan", "yang", "yao", "ye", "yi", "yin", "ying", "yo",
    "yong", "you", "yu", "yuan", "yue", "yun", "za", "zai", "zan", "zang", "zao", "ze", "zei",
    "zen", "zeng", "zha", "zhai", "zhan", "zhang", "zhao", "zhe", "zhen", "zheng", "zhi", "zhong",
    "zhou", "zhu", "zhua", "zhuai", "zhuan", "zhuang", "zhui", "zhun", "zhuo", "zi", "zong", "zou",
    "zu", "zuan", "zui", "zun", "zuo",
};

/// True if `s` is exactly one table syllable.
pub fn is_valid_syllable(s: &str) -> bool {
    PINYIN_SYLLABLES.contains(s)
}

pub fn syllable_count() -> usize {
    PINYIN_SYLLABLES.len()
}

/// True if every space-separated token of `romanization` is a syllable.
pub fn is_valid_romanization(romanization: &str) -> bool {
    let mut any = false;
    for syl in romanization.split_whitespace() {
        if !is_valid_syllable(syl) {
            return false;
        }
        any = true;
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_bounds() {
        let max = PINYIN_SYLLABLES.iter().map(|s| s.chars().count()).max();
        let min = PINYIN_SYLLABLES.iter().map(|s| s.chars().count()).min();
        assert_eq!(max, Some(MAX_SYLLABLE_LEN));
        assert_eq!(min, Some(MIN_SYLLABLE_LEN));
        assert!(syllable_count() > 400);
    }

    #[test]
    fn umlaut_forms_only() {
        assert!(is_valid_syllable("lü"));
        assert!(is_valid_syllable("nüe"));
        assert!(!is_valid_syllable("lv"));
        assert!(!is_valid_syllable("nve"));
    }

    #[test]
    fn no_bare_initials() {
        for s in ["b", "j", "zh", "sh", "ch", "bj"] {
            assert!(!is_valid_syllable(s), "{s} should not be a syllable");
        }
    }

    #[test]
    fn romanization_check() {
        assert!(is_valid_romanization("ni hao"));
        assert!(is_valid_romanization("lü se"));
        assert!(!is_valid_romanization("ni hx"));
        assert!(!is_valid_romanization(""));
    }
}
